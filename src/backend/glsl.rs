//! Scanning the interface of GLSL ES 3.00 shaders.
//!
//! This isn't a GLSL compiler. It checks the overall shape of a shader (the version directive,
//! balanced braces, a `main` function) and collects the top-level `in`, `out` and `uniform`
//! declarations that linking and uniform updates are checked against.

use std::{collections::HashMap, fmt};

use crate::backend::{ShaderStage, UniformKind};

const PRECISIONS: [&str; 3] = ["lowp", "mediump", "highp"];

/// An `in` or `out` variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub ty: String,
    pub location: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uniform {
    pub name: String,
    pub kind: UniformKind,
}

/// The declarations a shader exposes to the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct ShaderInterface {
    pub stage: ShaderStage,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
    pub uniforms: Vec<Uniform>,
}

impl ShaderInterface {
    fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            inputs: Vec::new(),
            outputs: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    fn is_declared(&self, name: &str) -> bool {
        self.uniform(name).is_some()
            || self.inputs.iter().any(|v| v.name == name)
            || self.outputs.iter().any(|v| v.name == name)
    }
}

/// A compile error, displayed the way GL drivers write info logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR: 0:{}: {}", self.line, self.message)
    }
}

/// Scan `source` as a shader for `stage`.
pub fn scan(source: &str, stage: ShaderStage) -> Result<ShaderInterface, Diagnostic> {
    let text = strip_comments(source)?;
    let text = check_version(&text)?;

    let mut interface = ShaderInterface::new(stage);
    let mut has_main = false;

    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut line = 1;
    let mut statement = String::new();
    let mut start = line;

    for ch in text.chars() {
        match ch {
            '\n' => {
                line += 1;
                if depth == 0 {
                    statement.push(' ');
                }
            }

            '(' => {
                parens += 1;
                if depth == 0 {
                    statement.push(ch);
                }
            }

            ')' => {
                if parens == 0 {
                    return Err(Diagnostic::new(line, "')' : syntax error"));
                }
                parens -= 1;
                if depth == 0 {
                    statement.push(ch);
                }
            }

            '{' => {
                if depth == 0 {
                    if parens != 0 {
                        return Err(Diagnostic::new(line, "'{' : syntax error"));
                    }
                    has_main |= function_header(&statement, start, has_main)?;
                    statement.clear();
                }
                depth += 1;
            }

            '}' => {
                if depth == 0 {
                    return Err(Diagnostic::new(line, "'}' : syntax error"));
                }
                depth -= 1;
                if depth == 0 && parens != 0 {
                    return Err(Diagnostic::new(line, "'}' : syntax error"));
                }
            }

            ';' if depth == 0 => {
                if parens != 0 {
                    return Err(Diagnostic::new(line, "';' : syntax error"));
                }
                declaration(&mut interface, &statement, start)?;
                statement.clear();
            }

            _ if depth == 0 => {
                if statement.trim().is_empty() && !ch.is_whitespace() {
                    start = line;
                }
                statement.push(ch);
            }

            _ => {}
        }
    }

    if depth != 0 || parens != 0 {
        return Err(Diagnostic::new(line, "'' : unexpected end of file"));
    }

    if !statement.trim().is_empty() {
        return Err(Diagnostic::new(start, "'' : syntax error, missing ';'"));
    }

    if !has_main {
        return Err(Diagnostic::new(line, "'' : missing main function"));
    }

    Ok(interface)
}

/// Check that a vertex and a fragment shader fit together, and that the fragment side declares
/// every uniform in `required`. Returns every uniform the program declares.
pub fn check_link(
    vertex: &ShaderInterface,
    fragment: &ShaderInterface,
    required: &[(&str, UniformKind)],
) -> Result<HashMap<String, UniformKind>, String> {
    if vertex.stage != ShaderStage::Vertex {
        return Err(format!(
            "ERROR: Linking: expected a vertex shader, found a {} shader",
            vertex.stage
        ));
    }

    if fragment.stage != ShaderStage::Fragment {
        return Err(format!(
            "ERROR: Linking: expected a fragment shader, found a {} shader",
            fragment.stage
        ));
    }

    let position = vertex.inputs.iter().any(|v| {
        v.ty == "vec2" && (v.location == Some(0) || (v.location.is_none() && vertex.inputs.len() == 1))
    });
    if !position {
        return Err("ERROR: Linking: no vec2 attribute at location 0 for the quad positions".into());
    }

    if !fragment.outputs.iter().any(|v| v.ty == "vec4") {
        return Err("ERROR: Linking: fragment shader has no vec4 color output".into());
    }

    for input in &fragment.inputs {
        match vertex.outputs.iter().find(|v| v.name == input.name) {
            None => {
                return Err(format!(
                    "ERROR: Linking: fragment input '{}' is not written by the vertex shader",
                    input.name
                ))
            }
            Some(output) if output.ty != input.ty => {
                return Err(format!(
                    "ERROR: Linking: '{}' is {} in the vertex shader but {} in the fragment shader",
                    input.name, output.ty, input.ty
                ))
            }
            Some(_) => {}
        }
    }

    let mut uniforms = HashMap::new();
    for uniform in vertex.uniforms.iter().chain(&fragment.uniforms) {
        if let Some(kind) = uniforms.insert(uniform.name.clone(), uniform.kind) {
            if kind != uniform.kind {
                return Err(format!(
                    "ERROR: Linking: uniform '{}' is declared as both {} and {}",
                    uniform.name, kind, uniform.kind
                ));
            }
        }
    }

    for &(name, kind) in required {
        match fragment.uniform(name) {
            Some(uniform) if uniform.kind == kind => {}
            Some(uniform) => {
                return Err(format!(
                    "ERROR: Linking: uniform '{}' must be {}, but is declared as {}",
                    name, kind, uniform.kind
                ))
            }
            None => {
                return Err(format!(
                    "ERROR: Linking: fragment shader does not declare uniform {} {}",
                    kind, name
                ))
            }
        }
    }

    Ok(uniforms)
}

/// Replace comments with spaces, keeping line breaks so that line numbers stay put.
fn strip_comments(source: &str) -> Result<String, Diagnostic> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(ch) = chars.next() {
        match (ch, chars.peek()) {
            ('/', Some('/')) => {
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        line += 1;
                        out.push('\n');
                        break;
                    }
                }
            }

            ('/', Some('*')) => {
                let start = line;
                chars.next();
                let mut prev = ' ';
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        line += 1;
                        out.push('\n');
                    } else if prev == '*' && ch == '/' {
                        closed = true;
                        break;
                    }
                    prev = ch;
                }
                if !closed {
                    return Err(Diagnostic::new(start, "'/*' : unterminated comment"));
                }
                out.push(' ');
            }

            _ => {
                if ch == '\n' {
                    line += 1;
                }
                out.push(ch);
            }
        }
    }

    Ok(out)
}

/// Require `#version 300 es` before anything else, and blank out the directive.
fn check_version(text: &str) -> Result<String, Diagnostic> {
    let mut out = String::with_capacity(text.len());
    let mut seen_version = false;

    for (ix, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        let number = ix + 1;

        if let Some(directive) = trimmed.strip_prefix('#') {
            let words: Vec<_> = directive.split_whitespace().collect();
            match words.as_slice() {
                ["version", "300", "es"] if !seen_version => seen_version = true,
                ["version", ..] if seen_version => {
                    return Err(Diagnostic::new(number, "'#version' : must occur only once"))
                }
                ["version", ..] => {
                    return Err(Diagnostic::new(
                        number,
                        "'#version' : only version 300 es is supported",
                    ))
                }
                _ => {
                    return Err(Diagnostic::new(
                        number,
                        format!("'#{}' : preprocessor directive not supported", directive),
                    ))
                }
            }
        } else {
            if !seen_version && !trimmed.is_empty() {
                return Err(Diagnostic::new(
                    number,
                    "'' : #version 300 es must be the first directive",
                ));
            }
            out.push_str(line);
        }

        out.push('\n');
    }

    if !seen_version {
        return Err(Diagnostic::new(1, "'' : missing #version 300 es"));
    }

    Ok(out)
}

/// Split a statement into identifiers, numbers and single punctuation characters.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == '.' {
            current.push(ch);
            continue;
        }

        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }

        if !ch.is_whitespace() {
            tokens.push(ch.to_string());
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Inspect the text before a top-level `{`. Returns `true` when it starts the `main` function.
fn function_header(header: &str, line: usize, has_main: bool) -> Result<bool, Diagnostic> {
    let tokens = tokenize(header);
    let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();

    match tokens.as_slice() {
        ["void", "main", "(", ")"] | ["void", "main", "(", "void", ")"] => {
            if has_main {
                Err(Diagnostic::new(line, "'main' : function already has a body"))
            } else {
                Ok(true)
            }
        }
        tokens if tokens.windows(2).any(|w| w == ["main", "("]) => Err(Diagnostic::new(
            line,
            "'main' : main function must take no parameters and return void",
        )),
        ["uniform", ..] | ["layout", ..] => Err(Diagnostic::new(
            line,
            "'{' : interface blocks are not supported",
        )),
        _ => Ok(false),
    }
}

fn declaration(
    interface: &mut ShaderInterface,
    statement: &str,
    line: usize,
) -> Result<(), Diagnostic> {
    let tokens = tokenize(statement);
    let mut rest: Vec<&str> = tokens.iter().map(String::as_str).collect();

    if rest.is_empty() {
        return Ok(());
    }

    let mut location = None;
    let has_layout = rest[0] == "layout";
    if has_layout {
        let close = rest
            .iter()
            .position(|t| *t == ")")
            .filter(|_| rest.get(1) == Some(&"("))
            .ok_or_else(|| Diagnostic::new(line, "'layout' : syntax error"))?;

        for qualifier in rest[2..close].split(|t| *t == ",") {
            match qualifier {
                ["location", "=", value] => {
                    let value = value.parse().map_err(|_| {
                        Diagnostic::new(line, format!("'{}' : invalid location", value))
                    })?;
                    location = Some(value);
                }
                [name, ..] => {
                    return Err(Diagnostic::new(
                        line,
                        format!("'{}' : unsupported layout qualifier", name),
                    ))
                }
                [] => return Err(Diagnostic::new(line, "'layout' : syntax error")),
            }
        }

        rest.drain(..=close);
    }

    let qualifier = match rest.first() {
        Some(&q @ ("uniform" | "in" | "out")) => q,
        Some(&"precision") => {
            return match rest.as_slice() {
                ["precision", p, _] if PRECISIONS.contains(p) && !has_layout => Ok(()),
                _ => Err(Diagnostic::new(line, "'precision' : syntax error")),
            };
        }
        _ if has_layout => {
            return Err(Diagnostic::new(
                line,
                "'layout' : only applies to in, out and uniform declarations",
            ))
        }
        // other globals are of no interest to the interface
        _ => return Ok(()),
    };

    let mut decl = &rest[1..];
    if decl.first().map_or(false, |t| PRECISIONS.contains(t)) {
        decl = &decl[1..];
    }

    let (ty, name) = match decl {
        [ty, name] if is_identifier(ty) && is_identifier(name) => (*ty, *name),
        _ => {
            return Err(Diagnostic::new(
                line,
                format!("'{}' : unsupported declaration", qualifier),
            ))
        }
    };

    if interface.is_declared(name) {
        return Err(Diagnostic::new(line, format!("'{}' : redefinition", name)));
    }

    match qualifier {
        "uniform" => {
            let kind = UniformKind::from_glsl(ty).ok_or_else(|| {
                Diagnostic::new(line, format!("'{}' : unsupported uniform type", ty))
            })?;
            interface.uniforms.push(Uniform {
                name: name.to_string(),
                kind,
            });
        }
        _ => {
            let var = Variable {
                name: name.to_string(),
                ty: ty.to_string(),
                location,
            };
            if qualifier == "in" {
                interface.inputs.push(var);
            } else {
                interface.outputs.push(var);
            }
        }
    }

    Ok(())
}
