use actix::prelude::*;
use actix_files as fs;
use actix_web::{web, web::Bytes, App, HttpRequest, HttpResponse, HttpServer};
use actix_web_actors::ws;
use anyhow::{Context as _, Error};
use fs::NamedFile;
use log::{debug, error, info, warn};
use rand::{rngs::ThreadRng, Rng};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::{
    config::Config,
    controller::{software_controller, Event, SoftwareController},
};

#[actix_web::main]
pub async fn serve(
    port: u16,
    config: Config,
    static_dir: PathBuf,
    open_browser: bool,
) -> Result<(), Error> {
    let controller = software_controller(&config).context("failed to set up the renderer")?;
    let render_server = RenderServer::new(controller).start();

    let index = static_dir.join("index.html");
    if !index.is_file() {
        warn!("{} is missing, the page will not load", index.display());
    }

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(render_server.clone()))
            .app_data(web::Data::new(static_dir.clone()))
            .service(web::resource("/").to(index_route))
            .route("/ws", web::get().to(client_route))
            .service(fs::Files::new("/static", static_dir.clone()).index_file("index.html"))
    })
    .workers(2)
    .bind(("127.0.0.1", port))
    .with_context(|| format!("failed to bind port {}", port))?
    .run();

    let url = format!("http://127.0.0.1:{}/", port);
    info!("serving on {}", url);
    if open_browser {
        if let Err(err) = open::that(&url) {
            warn!("failed to open a browser: {}", err);
        }
    }

    server.await?;

    Ok(())
}

async fn index_route(static_dir: web::Data<PathBuf>) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open_async(static_dir.join("index.html")).await?)
}

async fn client_route(
    req: HttpRequest,
    stream: web::Payload,
    srv: web::Data<Addr<RenderServer>>,
) -> Result<HttpResponse, actix_web::Error> {
    debug!("new web socket connection");
    ws::start(
        RenderClient {
            id: 0,
            hb: Instant::now(),
            addr: srv.get_ref().clone(),
        },
        &req,
        stream,
    )
}

/// What the page sends about user input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Key { key: String },
    Loop { value: serde_json::Value },
    Resize { width: u32, height: u32 },
}

impl ClientMessage {
    pub fn into_event(self) -> Event {
        match self {
            ClientMessage::Key { key } => Event::Key(key),
            ClientMessage::Loop { value } => Event::SetIterations(parse_iterations(&value)),
            ClientMessage::Resize { width, height } => Event::Resize { width, height },
        }
    }
}

/// Convert the iteration control's value to an integer the way a GL integer uniform receives a
/// script value: numbers are truncated, anything that isn't a number becomes zero.
pub fn parse_iterations(value: &serde_json::Value) -> i32 {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) if s.trim().is_empty() => Some(0.),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number.filter(|n| n.is_finite()) {
        Some(n) => n as i32,
        None => {
            warn!("iteration count {} is not a number, using 0", value);
            0
        }
    }
}

/// An encoded PNG frame.
#[derive(Message, Clone)]
#[rtype(result = "()")]
struct Frame(Bytes);

#[derive(Message)]
#[rtype(result = "()")]
struct Input(ClientMessage);

#[derive(Message)]
#[rtype(usize)]
struct Connect {
    addr: Recipient<Frame>,
}

#[derive(Message)]
#[rtype(result = "()")]
struct Disconnect {
    id: usize,
}

/// Owns the controller. Its mailbox serializes input from every client.
struct RenderServer {
    controller: SoftwareController,
    clients: HashMap<usize, Recipient<Frame>>,
    rng: ThreadRng,
    frame: Option<Bytes>,
}

impl Actor for RenderServer {
    type Context = Context<Self>;
}

impl RenderServer {
    fn new(controller: SoftwareController) -> Self {
        let mut server = RenderServer {
            controller,
            clients: HashMap::new(),
            rng: rand::thread_rng(),
            frame: None,
        };
        server.encode_frame();
        server
    }

    fn encode_frame(&mut self) {
        self.frame = match self.controller.frame().to_png() {
            Ok(png) => Some(Bytes::from(png)),
            Err(err) => {
                error!("failed to encode frame {}: {}", self.controller.frames(), err);
                None
            }
        };
    }

    fn broadcast(&self) {
        if let Some(frame) = &self.frame {
            for client in self.clients.values() {
                client.do_send(Frame(frame.clone()))
            }
        }
    }
}

impl Handler<Input> for RenderServer {
    type Result = ();

    fn handle(&mut self, msg: Input, _: &mut Context<Self>) -> Self::Result {
        if let Err(err) = self.controller.handle(msg.0.into_event()) {
            error!("redraw failed: {}", err);
            return;
        }

        self.encode_frame();
        self.broadcast();
    }
}

impl Handler<Connect> for RenderServer {
    type Result = usize;

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) -> Self::Result {
        let id = self.rng.gen::<usize>();

        if let Some(frame) = &self.frame {
            msg.addr.do_send(Frame(frame.clone()));
        }

        self.clients.insert(id, msg.addr);
        info!("client {} connected, {} total", id, self.clients.len());
        id
    }
}

impl Handler<Disconnect> for RenderServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) -> Self::Result {
        if self.clients.remove(&msg.id).is_some() {
            info!("client {} disconnected", msg.id);
        }
    }
}

struct RenderClient {
    id: usize,
    hb: Instant,
    addr: Addr<RenderServer>,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

impl RenderClient {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("heartbeat failed, disconnecting client {}", act.id);
                act.addr.do_send(Disconnect { id: act.id });
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }
}

impl Actor for RenderClient {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        let addr = ctx.address();
        self.addr
            .send(Connect {
                addr: addr.recipient(),
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(res) => act.id = res,
                    _ => ctx.stop(),
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.addr.do_send(Disconnect { id: self.id });
        Running::Stop
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RenderClient {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Err(err) => {
                warn!("protocol error from client {}: {}", self.id, err);
                ctx.stop();
                return;
            }

            Ok(msg) => msg,
        };

        match msg {
            ws::Message::Ping(msg) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }

            ws::Message::Pong(_) => self.hb = Instant::now(),

            ws::Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => self.addr.do_send(Input(msg)),
                Err(err) => warn!("ignoring message `{}`: {}", text, err),
            },

            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }

            _ => (),
        }
    }
}

impl Handler<Frame> for RenderClient {
    type Result = ();

    fn handle(&mut self, msg: Frame, ctx: &mut Self::Context) {
        ctx.binary(msg.0);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(text: &str) -> Event {
        serde_json::from_str::<ClientMessage>(text)
            .unwrap()
            .into_event()
    }

    #[test]
    fn test_client_messages() {
        assert_eq!(
            Event::Key("ArrowUp".into()),
            parse(r#"{"type":"key","key":"ArrowUp"}"#)
        );
        assert_eq!(
            Event::SetIterations(100),
            parse(r#"{"type":"loop","value":"100"}"#)
        );
        assert_eq!(
            Event::Resize {
                width: 1024,
                height: 768
            },
            parse(r#"{"type":"resize","width":1024,"height":768}"#)
        );
    }

    #[test]
    fn test_unknown_messages() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"zoom"}"#).is_err());
        let negative = r#"{"type":"resize","width":-1,"height":2}"#;
        assert!(serde_json::from_str::<ClientMessage>(negative).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    #[test]
    fn test_parse_iterations() {
        assert_eq!(42, parse_iterations(&json!("42")));
        assert_eq!(42, parse_iterations(&json!(" 42 ")));
        assert_eq!(42, parse_iterations(&json!(42)));
        assert_eq!(12, parse_iterations(&json!("12.9")));
        assert_eq!(-3, parse_iterations(&json!("-3")));
        assert_eq!(0, parse_iterations(&json!("")));
        assert_eq!(0, parse_iterations(&json!("lots")));
        assert_eq!(0, parse_iterations(&json!(null)));
    }
}
