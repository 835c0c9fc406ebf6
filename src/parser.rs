//! Parser for `.scn` scene files.
//!
//! The format is line-oriented only in spirit: `#` starts a line comment,
//! `#{ … }#` a block comment, and declarations look like
//!
//! ```text
//! Textures
//! {
//!     1 = "data/checkerboard.tga",
//! }
//!
//! Sphere (Center = (0, 4, 0), Radius = 1.5)
//! {
//!     Color = (0.8, 0.2, 0.2),
//!     Glossy = 0.5,
//! }
//!
//! Camera (Origin = (0, -10, 0))
//! {
//!     LookAt = (0, 0, 0),
//!     SkyColor = (1, 1, 1),
//! }
//! ```
//!
//! Parsing halts at the first error, which carries the (line, column) and
//! the offending lexeme. Duplicate parameters and properties are errors.

use crate::camera::Camera;
use crate::math::{Uv, Vec3};
use crate::scene::{Object, Scene, Shape, Surface};
use crate::tga;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("error reading file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("({line}, {column}): {message}")]
    Parse {
        line: u32,
        column: u32,
        message: String,
    },
}

// ─── Tokens ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Equals,
    Comma,
    Minus,
    Number,
    Str,
    Textures,
    Plane,
    Sphere,
    Triangle,
    Parallelogram,
    Camera,
    Normal,
    Displacement,
    Center,
    Radius,
    Vertices,
    Origin,
    Axes,
    DistToSurface,
    SurfaceWidth,
    SurfaceHeight,
    Color,
    Glossy,
    Translucency,
    Refraction,
    Texture,
    UvMap,
    LookAt,
    SkyColor,
    Unknown,
    Eof,
}

fn keyword(word: &str) -> TokenKind {
    match word {
        "Textures" => TokenKind::Textures,
        "Plane" => TokenKind::Plane,
        "Sphere" => TokenKind::Sphere,
        "Triangle" => TokenKind::Triangle,
        "Parallelogram" => TokenKind::Parallelogram,
        "Camera" => TokenKind::Camera,
        "Normal" => TokenKind::Normal,
        "Displacement" => TokenKind::Displacement,
        "Center" => TokenKind::Center,
        "Radius" => TokenKind::Radius,
        "Vertices" => TokenKind::Vertices,
        "Origin" => TokenKind::Origin,
        "Axes" => TokenKind::Axes,
        "DistToSurface" => TokenKind::DistToSurface,
        "SurfaceWidth" => TokenKind::SurfaceWidth,
        "SurfaceHeight" => TokenKind::SurfaceHeight,
        "Color" => TokenKind::Color,
        "Glossy" => TokenKind::Glossy,
        "Translucency" => TokenKind::Translucency,
        "Refraction" => TokenKind::Refraction,
        "Texture" => TokenKind::Texture,
        "UVMap" => TokenKind::UvMap,
        "LookAt" => TokenKind::LookAt,
        "SkyColor" => TokenKind::SkyColor,
        _ => TokenKind::Unknown,
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    line: u32,
    column: u32,
    value: f32,
}

// ─── Tokenizer ──────────────────────────────────────────────────────────────

struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Tokenizer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            if c == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn advance_to(&mut self, terminator: u8) {
        while let Some(c) = self.peek() {
            if c == terminator {
                break;
            }
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        // Called with '#' current. `#{` opens a block closed by `}#`;
        // anything else runs to end of line.
        if self.data.get(self.pos + 1) == Some(&b'{') {
            self.advance_to(b'}');
            while self.peek().is_some() && self.data.get(self.pos + 1) != Some(&b'#') {
                self.advance();
                self.advance_to(b'}');
            }
            if self.data.get(self.pos + 1).is_some() {
                self.advance();
                self.advance();
            } else if self.peek().is_some() {
                self.advance();
            }
        } else {
            self.advance_to(b'\n');
            if self.peek().is_some() {
                self.advance();
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let line = self.line;
        let column = self.column;
        let start = self.pos;
        let mut value = (self.data[self.pos] - b'0') as f32;
        self.advance();

        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            value = value * 10.0 + (c - b'0') as f32;
            self.advance();
        }

        if self.peek() == Some(b'.') {
            self.advance();
            let mut place = 0.1f32;
            while let Some(c) = self.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                value += (c - b'0') as f32 * place;
                place *= 0.1;
                self.advance();
            }
        }

        Token {
            kind: TokenKind::Number,
            text: String::from_utf8_lossy(&self.data[start..self.pos]).into_owned(),
            line,
            column,
            value,
        }
    }

    fn read_string(&mut self) -> Token {
        self.advance(); // opening quote
        let line = self.line;
        let column = self.column;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'"' || c == b'\0' {
                break;
            }
            self.advance();
        }
        let text = String::from_utf8_lossy(&self.data[start..self.pos]).into_owned();
        let kind = if self.peek() == Some(b'"') {
            self.advance();
            TokenKind::Str
        } else {
            // Unterminated string literal
            TokenKind::Unknown
        };
        Token {
            kind,
            text,
            line,
            column,
            value: 0.0,
        }
    }

    fn read_word(&mut self) -> Token {
        let line = self.line;
        let column = self.column;
        let start = self.pos;
        self.advance();
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            self.advance();
        }
        let text = String::from_utf8_lossy(&self.data[start..self.pos]).into_owned();
        Token {
            kind: keyword(&text),
            text,
            line,
            column,
            value: 0.0,
        }
    }

    fn punctuation(&mut self, kind: TokenKind, c: u8) -> Token {
        let token = Token {
            kind,
            text: (c as char).to_string(),
            line: self.line,
            column: self.column,
            value: 0.0,
        };
        self.advance();
        token
    }

    fn next_token(&mut self) -> Token {
        loop {
            while let Some(c) = self.peek() {
                if c.is_ascii_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }

            let Some(c) = self.peek() else {
                return Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    line: self.line,
                    column: self.column,
                    value: 0.0,
                };
            };

            match c {
                b'#' => self.skip_comment(),
                b'(' => return self.punctuation(TokenKind::LeftParen, c),
                b')' => return self.punctuation(TokenKind::RightParen, c),
                b'{' => return self.punctuation(TokenKind::LeftBrace, c),
                b'}' => return self.punctuation(TokenKind::RightBrace, c),
                b'=' => return self.punctuation(TokenKind::Equals, c),
                b',' => return self.punctuation(TokenKind::Comma, c),
                b'-' => return self.punctuation(TokenKind::Minus, c),
                b'"' => return self.read_string(),
                b'0'..=b'9' => return self.read_number(),
                b'a'..=b'z' | b'A'..=b'Z' => return self.read_word(),
                _ => return self.punctuation(TokenKind::Unknown, c),
            }
        }
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

fn parse_error(line: u32, column: u32, message: String) -> SceneError {
    SceneError::Parse {
        line,
        column,
        message,
    }
}

/// Whether a comma-separated list ended or continues.
enum Sep {
    End,
    Continue,
}

struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Token {
        self.tokenizer.next_token()
    }

    /// Consume a token of `kind` or report it as the offending lexeme.
    /// Used for the fine-grained structure inside a declaration; callers
    /// wrap failures with a context phrase carrying the declaration's
    /// position.
    fn expect(&mut self, kind: TokenKind) -> Result<Token, Token> {
        let token = self.next();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(token)
        }
    }

    fn expect_open(&mut self, kind: TokenKind, symbol: char, what: &str) -> Result<(), SceneError> {
        self.expect(kind).map(|_| ()).map_err(|token| {
            parse_error(
                token.line,
                token.column,
                format!(
                    "Invalid {what}. Expected '{symbol}', got '{}'",
                    token.text
                ),
            )
        })
    }

    /// A signed number: an optional `-` token followed by a number token.
    fn number(&mut self) -> Result<f32, Token> {
        let mut token = self.next();
        let negative = token.kind == TokenKind::Minus;
        if negative {
            token = self.next();
        }
        if token.kind == TokenKind::Number {
            Ok(if negative { -token.value } else { token.value })
        } else {
            Err(token)
        }
    }

    /// `= N`
    fn scalar_value(&mut self) -> Result<f32, Token> {
        self.expect(TokenKind::Equals)?;
        self.number()
    }

    /// `(N, N)`
    fn pair(&mut self) -> Result<Uv, Token> {
        self.expect(TokenKind::LeftParen)?;
        let x = self.number()?;
        self.expect(TokenKind::Comma)?;
        let y = self.number()?;
        self.expect(TokenKind::RightParen)?;
        Ok(Uv::new(x, y))
    }

    /// `= ((N, N, N), (N, N, N), (N, N, N))`
    fn vertices_value(&mut self) -> Result<[Vec3; 3], Token> {
        self.expect(TokenKind::Equals)?;
        self.expect(TokenKind::LeftParen)?;
        let v0 = self.triple()?;
        self.expect(TokenKind::Comma)?;
        let v1 = self.triple()?;
        self.expect(TokenKind::Comma)?;
        let v2 = self.triple()?;
        self.expect(TokenKind::RightParen)?;
        Ok([v0, v1, v2])
    }

    /// `= ((N, N, N), (N, N, N))`
    fn axes_value(&mut self) -> Result<(Vec3, Vec3), Token> {
        self.expect(TokenKind::Equals)?;
        self.expect(TokenKind::LeftParen)?;
        let x_axis = self.triple()?;
        self.expect(TokenKind::Comma)?;
        let y_axis = self.triple()?;
        self.expect(TokenKind::RightParen)?;
        Ok((x_axis, y_axis))
    }

    /// `= ((U, V), (U, V), (U, V))`
    fn uv_map_value(&mut self) -> Result<[Uv; 3], Token> {
        self.expect(TokenKind::Equals)?;
        self.expect(TokenKind::LeftParen)?;
        let uv0 = self.pair()?;
        self.expect(TokenKind::Comma)?;
        let uv1 = self.pair()?;
        self.expect(TokenKind::Comma)?;
        let uv2 = self.pair()?;
        self.expect(TokenKind::RightParen)?;
        Ok([uv0, uv1, uv2])
    }

    /// `= (N, N, N)`
    fn triple_value(&mut self) -> Result<Vec3, Token> {
        self.expect(TokenKind::Equals)?;
        self.expect(TokenKind::LeftParen)?;
        let x = self.number()?;
        self.expect(TokenKind::Comma)?;
        let y = self.number()?;
        self.expect(TokenKind::Comma)?;
        let z = self.number()?;
        self.expect(TokenKind::RightParen)?;
        Ok(Vec3::new(x, y, z))
    }

    /// After a parameter or property, either the closer or a comma.
    fn separator(&mut self, end: TokenKind, context: &str) -> Result<Sep, SceneError> {
        let token = self.next();
        if token.kind == end {
            Ok(Sep::End)
        } else if token.kind == TokenKind::Comma {
            Ok(Sep::Continue)
        } else {
            Err(parse_error(
                token.line,
                token.column,
                format!("Invalid token in {context}: '{}'", token.text),
            ))
        }
    }

    fn duplicate(&self, token: &Token, what: &str, context: &str) -> SceneError {
        parse_error(
            token.line,
            token.column,
            format!("Extra {what} in {context}"),
        )
    }

    fn invalid_value(&self, token: &Token, what: &str) -> SceneError {
        parse_error(
            token.line,
            token.column,
            format!("Invalid {what} declaration"),
        )
    }

    // ─── Object declarations ────────────────────────────────────────────

    fn parse_plane(&mut self) -> Result<Object, SceneError> {
        self.expect_open(TokenKind::LeftParen, '(', "plane declaration")?;

        let context = "plane declaration";
        let mut normal = None;
        let mut displacement = None;

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::RightParen => break,
                TokenKind::Normal => {
                    if normal.is_some() {
                        return Err(self.duplicate(&token, "normal", context));
                    }
                    normal = Some(
                        self.triple_value()
                            .map_err(|_| self.invalid_value(&token, "plane normal"))?,
                    );
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                TokenKind::Displacement => {
                    if displacement.is_some() {
                        return Err(self.duplicate(&token, "displacement", context));
                    }
                    displacement = Some(
                        self.scalar_value()
                            .map_err(|_| self.invalid_value(&token, "plane displacement"))?,
                    );
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                _ => {
                    return Err(parse_error(
                        token.line,
                        token.column,
                        format!("Invalid token in {context}: '{}'", token.text),
                    ));
                }
            }
        }

        let mut object = Object::new(Shape::Plane {
            normal: normal.unwrap_or(Vec3::zero()),
            displacement: displacement.unwrap_or(0.0),
        });
        self.parse_object_properties(&mut object)?;
        Ok(object)
    }

    fn parse_sphere(&mut self) -> Result<Object, SceneError> {
        self.expect_open(TokenKind::LeftParen, '(', "sphere declaration")?;

        let context = "sphere declaration";
        let mut center = None;
        let mut radius = None;

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::RightParen => break,
                TokenKind::Center => {
                    if center.is_some() {
                        return Err(self.duplicate(&token, "center", context));
                    }
                    center = Some(
                        self.triple_value()
                            .map_err(|_| self.invalid_value(&token, "sphere center"))?,
                    );
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                TokenKind::Radius => {
                    if radius.is_some() {
                        return Err(self.duplicate(&token, "radius", context));
                    }
                    radius = Some(
                        self.scalar_value()
                            .map_err(|_| self.invalid_value(&token, "sphere radius"))?,
                    );
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                _ => {
                    return Err(parse_error(
                        token.line,
                        token.column,
                        format!("Invalid token in {context}: '{}'", token.text),
                    ));
                }
            }
        }

        let mut object = Object::new(Shape::Sphere {
            center: center.unwrap_or(Vec3::zero()),
            radius: radius.unwrap_or(0.0),
        });
        self.parse_object_properties(&mut object)?;
        Ok(object)
    }

    fn parse_triangle(&mut self) -> Result<Object, SceneError> {
        self.expect_open(TokenKind::LeftParen, '(', "triangle declaration")?;

        let context = "triangle declaration";
        let mut vertices = None;

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::RightParen => break,
                TokenKind::Vertices => {
                    if vertices.is_some() {
                        return Err(self.duplicate(&token, "vertices", context));
                    }
                    let parsed = self
                        .vertices_value()
                        .map_err(|_| self.invalid_value(&token, "triangle vertices"))?;
                    vertices = Some(parsed);
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                _ => {
                    return Err(parse_error(
                        token.line,
                        token.column,
                        format!("Invalid token in {context}: '{}'", token.text),
                    ));
                }
            }
        }

        let mut object = Object::new(Shape::Triangle {
            vertices: vertices.unwrap_or([Vec3::zero(); 3]),
        });
        self.parse_object_properties(&mut object)?;
        Ok(object)
    }

    /// `(N, N, N)` without the leading equals; shared by nested tuples.
    fn triple(&mut self) -> Result<Vec3, Token> {
        self.expect(TokenKind::LeftParen)?;
        let x = self.number()?;
        self.expect(TokenKind::Comma)?;
        let y = self.number()?;
        self.expect(TokenKind::Comma)?;
        let z = self.number()?;
        self.expect(TokenKind::RightParen)?;
        Ok(Vec3::new(x, y, z))
    }

    fn parse_parallelogram(&mut self) -> Result<Object, SceneError> {
        self.expect_open(TokenKind::LeftParen, '(', "parallelogram declaration")?;

        let context = "parallelogram declaration";
        let mut origin = None;
        let mut axes = None;

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::RightParen => break,
                TokenKind::Origin => {
                    if origin.is_some() {
                        return Err(self.duplicate(&token, "origin", context));
                    }
                    origin = Some(
                        self.triple_value()
                            .map_err(|_| self.invalid_value(&token, "parallelogram origin"))?,
                    );
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                TokenKind::Axes => {
                    if axes.is_some() {
                        return Err(self.duplicate(&token, "axes", context));
                    }
                    let parsed = self
                        .axes_value()
                        .map_err(|_| self.invalid_value(&token, "parallelogram axes"))?;
                    axes = Some(parsed);
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                _ => {
                    return Err(parse_error(
                        token.line,
                        token.column,
                        format!("Invalid token in {context}: '{}'", token.text),
                    ));
                }
            }
        }

        let (x_axis, y_axis) = axes.unwrap_or((Vec3::zero(), Vec3::zero()));
        let mut object = Object::new(Shape::Parallelogram {
            origin: origin.unwrap_or(Vec3::zero()),
            x_axis,
            y_axis,
        });
        self.parse_object_properties(&mut object)?;
        Ok(object)
    }

    /// The shared `{ Color = …, Glossy = …, … }` block.
    fn parse_object_properties(&mut self, object: &mut Object) -> Result<(), SceneError> {
        self.expect_open(TokenKind::LeftBrace, '{', "object property declaration")?;

        let context = "object properties declaration";
        let mut read_color = false;
        let mut read_glossy = false;
        let mut read_translucency = false;
        let mut read_refraction = false;
        let mut read_texture = false;
        let mut read_uv_map = false;

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::RightBrace => break,
                TokenKind::Color => {
                    if read_color {
                        return Err(self.duplicate(&token, "color", context));
                    }
                    read_color = true;
                    object.color = self
                        .triple_value()
                        .map_err(|_| self.invalid_value(&token, "object color"))?;
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                TokenKind::Glossy => {
                    if read_glossy {
                        return Err(self.duplicate(&token, "glossy", context));
                    }
                    read_glossy = true;
                    object.glossy = self
                        .scalar_value()
                        .map_err(|_| self.invalid_value(&token, "object glossy"))?;
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                TokenKind::Translucency => {
                    if read_translucency {
                        return Err(self.duplicate(&token, "translucency", context));
                    }
                    read_translucency = true;
                    object.translucency = self
                        .scalar_value()
                        .map_err(|_| self.invalid_value(&token, "object translucency"))?;
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                TokenKind::Refraction => {
                    if read_refraction {
                        return Err(self.duplicate(&token, "refraction", context));
                    }
                    read_refraction = true;
                    object.refraction = self
                        .scalar_value()
                        .map_err(|_| self.invalid_value(&token, "object refraction"))?;
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                TokenKind::Texture => {
                    if read_texture {
                        return Err(self.duplicate(&token, "texture", context));
                    }
                    read_texture = true;
                    let value = self
                        .scalar_value()
                        .map_err(|_| self.invalid_value(&token, "object texture"))?;
                    // Zero and negative indices mean "untextured".
                    object.texture = if value > 0.0 { value as u32 } else { 0 };
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                TokenKind::UvMap => {
                    if read_uv_map {
                        return Err(self.duplicate(&token, "uv map", context));
                    }
                    read_uv_map = true;
                    object.uv_map = self
                        .uv_map_value()
                        .map_err(|_| self.invalid_value(&token, "object uv map"))?;
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                _ => {
                    return Err(parse_error(
                        token.line,
                        token.column,
                        format!("Invalid token in {context}: '{}'", token.text),
                    ));
                }
            }
        }

        Ok(())
    }

    // ─── Camera ─────────────────────────────────────────────────────────

    fn parse_camera(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        self.expect_open(TokenKind::LeftParen, '(', "camera declaration")?;

        scene.camera = Camera::default();
        let context = "camera declaration";
        let mut read_origin = false;
        let mut read_dist = false;
        let mut read_width = false;
        let mut read_height = false;

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::RightParen => break,
                TokenKind::Origin => {
                    if read_origin {
                        return Err(self.duplicate(&token, "origin", context));
                    }
                    read_origin = true;
                    scene.camera.origin = self
                        .triple_value()
                        .map_err(|_| self.invalid_value(&token, "camera origin"))?;
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                TokenKind::DistToSurface => {
                    if read_dist {
                        return Err(self.duplicate(&token, "dist-to-surface", context));
                    }
                    read_dist = true;
                    scene.camera.dist_to_surface = self
                        .scalar_value()
                        .map_err(|_| self.invalid_value(&token, "camera dist-to-surface"))?;
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                TokenKind::SurfaceWidth => {
                    if read_width {
                        return Err(self.duplicate(&token, "surface width", context));
                    }
                    read_width = true;
                    scene.camera.surface_width = self
                        .scalar_value()
                        .map_err(|_| self.invalid_value(&token, "camera surface width"))?;
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                TokenKind::SurfaceHeight => {
                    if read_height {
                        return Err(self.duplicate(&token, "surface height", context));
                    }
                    read_height = true;
                    scene.camera.surface_height = self
                        .scalar_value()
                        .map_err(|_| self.invalid_value(&token, "camera surface height"))?;
                    if let Sep::End = self.separator(TokenKind::RightParen, context)? {
                        break;
                    }
                }
                _ => {
                    return Err(parse_error(
                        token.line,
                        token.column,
                        format!("Invalid token in {context}: '{}'", token.text),
                    ));
                }
            }
        }

        self.expect_open(TokenKind::LeftBrace, '{', "camera declaration")?;

        let mut read_look_at = false;
        let mut read_sky_color = false;

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::RightBrace => break,
                TokenKind::LookAt => {
                    if read_look_at {
                        return Err(self.duplicate(&token, "look-at", context));
                    }
                    read_look_at = true;
                    let target = self
                        .triple_value()
                        .map_err(|_| self.invalid_value(&token, "camera look-at"))?;
                    scene.camera.look_at(target);
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                TokenKind::SkyColor => {
                    if read_sky_color {
                        return Err(self.duplicate(&token, "sky color", context));
                    }
                    read_sky_color = true;
                    scene.sky_color = self
                        .triple_value()
                        .map_err(|_| self.invalid_value(&token, "camera sky color"))?;
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                _ => {
                    return Err(parse_error(
                        token.line,
                        token.column,
                        format!("Invalid token in {context}: '{}'", token.text),
                    ));
                }
            }
        }

        Ok(())
    }

    // ─── Textures ───────────────────────────────────────────────────────

    fn parse_textures(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        self.expect_open(TokenKind::LeftBrace, '{', "textures declaration")?;

        let context = "textures declaration";
        let mut entries: Vec<(u32, String, u32, u32)> = Vec::new();

        loop {
            let token = self.next();
            match token.kind {
                TokenKind::RightBrace => break,
                TokenKind::Number => {
                    let index = token.value as i64;
                    if index as f32 != token.value {
                        return Err(parse_error(
                            token.line,
                            token.column,
                            format!("Texture index not an integer: '{}'", token.text),
                        ));
                    }
                    if index < 1 {
                        return Err(parse_error(
                            token.line,
                            token.column,
                            format!("Texture index out of range: '{}'", token.text),
                        ));
                    }
                    self.expect(TokenKind::Equals).map_err(|t| {
                        parse_error(
                            t.line,
                            t.column,
                            format!("Invalid token in {context}: '{}'", t.text),
                        )
                    })?;
                    let path_token = self.next();
                    if path_token.kind != TokenKind::Str {
                        return Err(parse_error(
                            path_token.line,
                            path_token.column,
                            format!(
                                "Invalid token in texture declaration. Expected string, got '{}'",
                                path_token.text
                            ),
                        ));
                    }
                    entries.push((
                        index as u32,
                        path_token.text,
                        path_token.line,
                        path_token.column,
                    ));
                    if let Sep::End = self.separator(TokenKind::RightBrace, context)? {
                        break;
                    }
                }
                _ => {
                    return Err(parse_error(
                        token.line,
                        token.column,
                        format!("Invalid token in {context}: '{}'", token.text),
                    ));
                }
            }
        }

        let count = entries.iter().map(|e| e.0).max().unwrap_or(0);
        scene.textures = vec![Surface::default(); count as usize];
        for (index, path, line, column) in entries {
            let surface =
                tga::load_tga(Path::new(&path), true).map_err(|err| {
                    parse_error(
                        line,
                        column,
                        format!("Could not load texture from file '{path}': {err}"),
                    )
                })?;
            scene.textures[(index - 1) as usize] = surface;
        }

        Ok(())
    }
}

// ─── Entry points ───────────────────────────────────────────────────────────

/// Parses scene text. Texture paths inside the scene resolve against the
/// process working directory, exactly as written.
pub fn parse_scene(source: &[u8]) -> Result<Scene, SceneError> {
    let mut parser = Parser {
        tokenizer: Tokenizer::new(source),
    };
    let mut scene = Scene::default();

    let mut token = parser.next();
    if token.kind == TokenKind::Textures {
        parser.parse_textures(&mut scene)?;
        token = parser.next();
    }

    loop {
        match token.kind {
            TokenKind::Plane => scene.objects.push(parser.parse_plane()?),
            TokenKind::Sphere => scene.objects.push(parser.parse_sphere()?),
            TokenKind::Triangle => scene.objects.push(parser.parse_triangle()?),
            TokenKind::Parallelogram => scene.objects.push(parser.parse_parallelogram()?),
            TokenKind::Camera => parser.parse_camera(&mut scene)?,
            TokenKind::Eof => break,
            _ => {
                return Err(parse_error(
                    token.line,
                    token.column,
                    format!("Expected object declaration, got '{}'", token.text),
                ));
            }
        }
        token = parser.next();
    }

    Ok(scene)
}

/// Loads and parses a scene file.
pub fn load_scene_from_file(path: &Path) -> Result<Scene, SceneError> {
    let data = std::fs::read(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scene(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn parses_sphere_with_properties() {
        let scene = parse_scene(
            br#"
            Sphere (Center = (1, -2, 3.5), Radius = 0.5)
            {
                Color = (0.8, 0.2, 0.1),
                Glossy = 0.25,
                Translucency = 0.5,
                Refraction = 0.1,
            }
            "#,
        )
        .unwrap();

        assert_eq!(scene.objects.len(), 1);
        let object = &scene.objects[0];
        match object.shape {
            Shape::Sphere { center, radius } => {
                assert_eq!(center, Vec3::new(1.0, -2.0, 3.5));
                assert_eq!(radius, 0.5);
            }
            _ => panic!("expected a sphere"),
        }
        assert_eq!(object.color, Vec3::new(0.8, 0.2, 0.1));
        assert_eq!(object.glossy, 0.25);
        assert_eq!(object.translucency, 0.5);
        assert!((object.refraction - 0.1).abs() < 1e-6);
    }

    #[test]
    fn parses_plane_and_camera() {
        let scene = parse_scene(
            br#"
            # ground plane
            Plane (Normal = (0, 0, 1), Displacement = -1)
            {
                Color = (0.5, 0.5, 0.5),
            }

            Camera (Origin = (0, -10, 2), DistToSurface = 1, SurfaceWidth = 2, SurfaceHeight = 1)
            {
                LookAt = (0, 0, 0),
                SkyColor = (1, 1, 1),
            }
            "#,
        )
        .unwrap();

        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.sky_color, Vec3::ones());
        assert_eq!(scene.camera.origin, Vec3::new(0.0, -10.0, 2.0));
        assert_eq!(scene.camera.surface_width, 2.0);
        // Basis is orthonormal and faces the target
        assert!((scene.camera.z_axis.length() - 1.0).abs() < 1e-5);
        assert!(scene.camera.z_axis.dot(Vec3::new(0.0, -10.0, 2.0)) > 0.0);
    }

    #[test]
    fn parses_triangle_parallelogram_and_uv_map() {
        let scene = parse_scene(
            br#"
            Triangle (Vertices = ((0, 0, 0), (1, 0, 0), (0, 1, 0)))
            {
                UVMap = ((0, 0), (1, 0), (0, 1)),
            }
            Parallelogram (Origin = (0, 5, 0), Axes = ((1, 0, 0), (0, 0, 1)))
            {
                Color = (1, 1, 0),
            }
            "#,
        )
        .unwrap();

        assert_eq!(scene.objects.len(), 2);
        assert_eq!(scene.objects[0].uv_map[1], Uv::new(1.0, 0.0));
        match scene.objects[1].shape {
            Shape::Parallelogram { origin, x_axis, .. } => {
                assert_eq!(origin, Vec3::new(0.0, 5.0, 0.0));
                assert_eq!(x_axis, Vec3::new(1.0, 0.0, 0.0));
            }
            _ => panic!("expected a parallelogram"),
        }
    }

    #[test]
    fn block_comments_are_skipped() {
        let scene = parse_scene(
            br#"
            #{ this whole declaration is commented out:
            Sphere (Center = (0, 0, 0), Radius = 1) { }
            }#
            Sphere (Center = (0, 4, 0), Radius = 2) { }
            "#,
        )
        .unwrap();
        assert_eq!(scene.objects.len(), 1);
    }

    #[test]
    fn reports_line_and_column_of_bad_token() {
        let err = parse_scene(b"Sphere (Wobble = 3) { }").unwrap_err();
        match err {
            SceneError::Parse { line, column, message } => {
                assert_eq!(line, 1);
                assert_eq!(column, 9);
                assert!(message.contains("Wobble"), "message was: {message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_property_is_an_error() {
        let err = parse_scene(
            br#"
            Sphere (Center = (0, 0, 0), Radius = 1)
            {
                Glossy = 0.5,
                Glossy = 0.7,
            }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Extra glossy"));
    }

    #[test]
    fn texture_index_below_one_is_an_error() {
        let err = parse_scene(
            br#"
            Textures
            {
                0 = "data/checkerboard.tga",
            }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Texture index out of range"));
    }

    #[test]
    fn fractional_texture_index_is_an_error() {
        let err = parse_scene(
            br#"
            Textures
            {
                1.5 = "data/checkerboard.tga",
            }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not an integer"));
    }

    #[test]
    fn missing_texture_file_is_an_error() {
        let err = parse_scene(
            br#"
            Textures
            {
                1 = "no/such/texture.tga",
            }
            "#,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("Could not load texture from file 'no/such/texture.tga'"));
    }

    #[test]
    fn textures_load_into_one_based_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.tga");
        let mut surface = Surface::new(2, 2);
        surface.set(0, 0, Vec3::ones());
        crate::tga::write_tga(&surface, &path, true).unwrap();

        let text = format!(
            "Textures\n{{\n\t2 = \"{}\",\n}}\n",
            path.display()
        );
        let scene = parse_scene(text.as_bytes()).unwrap();
        assert_eq!(scene.textures.len(), 2);
        // Slot 0 (index 1) was never declared and stays empty.
        assert_eq!(scene.textures[0].width, 0);
        assert_eq!(scene.textures[1].width, 2);
    }

    #[test]
    fn empty_scene_parses_to_defaults() {
        let scene = parse_scene(b"").unwrap();
        assert!(scene.objects.is_empty());
        assert_eq!(scene.sky_color, Vec3::zero());
        assert_eq!(scene.camera.origin, Vec3::zero());
    }

    #[test]
    fn negative_and_decimal_numbers() {
        let scene = parse_scene(
            br#"
            Sphere (Center = (-1.25, -0.5, 12.75), Radius = 3)
            { }
            "#,
        )
        .unwrap();
        match scene.objects[0].shape {
            Shape::Sphere { center, .. } => {
                assert!((center.x + 1.25).abs() < 1e-6);
                assert!((center.y + 0.5).abs() < 1e-6);
                assert!((center.z - 12.75).abs() < 1e-6);
            }
            _ => unreachable!(),
        }
    }
}
