//! Source instrumentation for the JavaScript backend.
//!
//! `instrument` rewrites a user program so that running it under the
//! evaluator produces one step event per executed statement:
//!
//! * every `let`/`const` declaration keyword becomes `var`, so the
//!   declared names stay visible through the sandbox scope object;
//! * every statement gets a `__trace(L);` probe in front of it, `L` being
//!   the 1-based line of the statement in the original source;
//! * unbraced bodies of `if`/`else`/`while`/`for`/`do` are wrapped in
//!   braces so a probe cannot change what the statement governs;
//! * the declared top-level names are pre-seeded onto the sandbox, and
//!   the whole program is wrapped in
//!   `(async () => { with (sandbox) { ... } })();`.
//!
//! All rewriting happens as ordered span edits over the original text, so
//! comments, strings and untouched code survive byte for byte.

use super::lexer::{lex, Token, TokenKind};
use stepscope_core::StepscopeError;

/// Prefix of instrumented output; also the idempotence marker.
pub(crate) const WRAPPER_PREFIX: &str = "(async () => { with (sandbox) {";
const WRAPPER_SUFFIX: &str = "} })();";

/// Name of the trace hook injected before statements.
const TRACE_HOOK: &str = "__trace";

/// Rewrite `source` into its instrumented form.
///
/// # Errors
///
/// Returns [`StepscopeError::Instrumentation`] when the source cannot be
/// tokenized or its statement structure cannot be parsed.
pub fn instrument(source: &str) -> Result<String, StepscopeError> {
    // Re-instrumenting instrumented output must not stack probes or
    // wrappers.
    if source.trim_start().starts_with(WRAPPER_PREFIX) {
        return Ok(source.to_string());
    }

    let tokens = lex(source)?;
    let mut rewriter = Rewriter::new(source, tokens);
    rewriter.parse_statements(false)?;
    let seeds = rewriter.seed_assignments();
    let body = rewriter.apply_patches();
    Ok(format!("{WRAPPER_PREFIX} {seeds}\n{body}\n{WRAPPER_SUFFIX}"))
}

#[derive(Debug)]
enum Patch {
    Insert { at: usize, text: String },
    Replace { start: usize, end: usize, text: &'static str },
}

impl Patch {
    const fn pos(&self) -> usize {
        match self {
            Self::Insert { at, .. } => *at,
            Self::Replace { start, .. } => *start,
        }
    }
}

struct Rewriter<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    patches: Vec<Patch>,
    /// Top-level declared names, in first-seen order.
    seeds: Vec<String>,
    /// Statement-level function nesting; names declared inside functions
    /// are local and must not be seeded.
    fn_depth: usize,
    /// Byte offset one past the last consumed token.
    prev_end: usize,
    /// Last consumed token, for newline-termination decisions.
    last: Option<Token>,
}

impl<'a> Rewriter<'a> {
    fn new(src: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
            patches: Vec::new(),
            seeds: Vec::new(),
            fn_depth: 0,
            prev_end: 0,
            last: None,
        }
    }

    // ---- token cursor -------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        self.prev_end = token.end;
        self.last = Some(token.clone());
        Some(token)
    }

    fn token_text(&self, token: &Token) -> &'a str {
        &self.src[token.start..token.end]
    }

    fn at_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Punct(c))
    }

    fn at_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Ident && self.token_text(t) == word)
    }

    fn expect_punct(&mut self, c: char, context: &str) -> Result<Token, StepscopeError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Punct(c) => Ok(self.bump().unwrap_or_else(|| unreachable!())),
            Some(t) => Err(self.err_at(
                t.line,
                format!("expected '{c}' in {context}, found '{}'", self.token_text(t)),
            )),
            None => Err(self.err_eof(format!("expected '{c}' in {context}"))),
        }
    }

    fn err_at(&self, line: u32, message: impl Into<String>) -> StepscopeError {
        StepscopeError::instrumentation(format!("{} at line {line}", message.into()))
    }

    fn err_eof(&self, message: impl Into<String>) -> StepscopeError {
        let line = self.last.as_ref().map_or(1, |t| t.line);
        StepscopeError::instrumentation(format!(
            "{} near line {line}, unexpected end of input",
            message.into()
        ))
    }

    // ---- patch helpers ------------------------------------------------

    fn probe(&mut self, token: &Token) {
        self.patches.push(Patch::Insert {
            at: token.start,
            text: format!("{TRACE_HOOK}({}); ", token.line),
        });
    }

    fn record_seed(&mut self, name: &str) {
        if self.fn_depth == 0 && !self.seeds.iter().any(|s| s == name) {
            self.seeds.push(name.to_string());
        }
    }

    fn seed_assignments(&self) -> String {
        self.seeds
            .iter()
            .map(|name| format!("sandbox.{name} = undefined; "))
            .collect()
    }

    fn apply_patches(mut self) -> String {
        // Stable sort keeps same-position patches in push order, which is
        // what nests wrap-open, probe and keyword replacement correctly.
        self.patches.sort_by_key(Patch::pos);
        let mut out = String::with_capacity(self.src.len() + self.patches.len() * 16);
        let mut cursor = 0usize;
        for patch in &self.patches {
            match patch {
                Patch::Insert { at, text } => {
                    out.push_str(&self.src[cursor..*at]);
                    out.push_str(text);
                    cursor = *at;
                }
                Patch::Replace { start, end, text } => {
                    out.push_str(&self.src[cursor..*start]);
                    out.push_str(text);
                    cursor = *end;
                }
            }
        }
        out.push_str(&self.src[cursor..]);
        out
    }

    // ---- statements ---------------------------------------------------

    fn parse_statements(&mut self, in_block: bool) -> Result<(), StepscopeError> {
        loop {
            match self.peek() {
                None => {
                    if in_block {
                        return Err(self.err_eof("expected '}'"));
                    }
                    return Ok(());
                }
                Some(t) if t.kind == TokenKind::Punct('}') => {
                    if in_block {
                        return Ok(());
                    }
                    return Err(self.err_at(t.line, "unexpected '}'"));
                }
                Some(_) => self.parse_statement(true)?,
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn parse_statement(&mut self, probe: bool) -> Result<(), StepscopeError> {
        let Some(tok) = self.peek().cloned() else {
            return Ok(());
        };
        match tok.kind {
            TokenKind::Punct(';') => {
                self.bump();
                Ok(())
            }
            TokenKind::Punct('{') => {
                self.bump();
                self.parse_statements(true)?;
                self.expect_punct('}', "block")?;
                Ok(())
            }
            TokenKind::Ident => {
                let word = self.token_text(&tok);
                match word {
                    "var" | "let" | "const" if self.decl_follows() => {
                        self.parse_var_decl(probe, &tok)
                    }
                    "if" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        self.scan_parens("if condition")?;
                        self.parse_substatement()?;
                        if self.at_ident("else") {
                            self.bump();
                            self.parse_substatement()?;
                        }
                        Ok(())
                    }
                    "while" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        self.scan_parens("while condition")?;
                        self.parse_substatement()
                    }
                    "do" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        self.parse_substatement()?;
                        if !self.at_ident("while") {
                            return Err(match self.peek() {
                                Some(t) => self.err_at(t.line, "expected 'while' after do body"),
                                None => self.err_eof("expected 'while' after do body"),
                            });
                        }
                        self.bump();
                        self.scan_parens("do-while condition")?;
                        if self.at_punct(';') {
                            self.bump();
                        }
                        Ok(())
                    }
                    "for" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        if self.at_ident("await") {
                            self.bump();
                        }
                        self.parse_for_head()?;
                        self.parse_substatement()
                    }
                    "switch" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        self.scan_parens("switch discriminant")?;
                        self.parse_switch_body()
                    }
                    "try" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        self.expect_block("try")?;
                        if self.at_ident("catch") {
                            self.bump();
                            if self.at_punct('(') {
                                self.scan_parens("catch parameter")?;
                            }
                            self.expect_block("catch")?;
                        }
                        if self.at_ident("finally") {
                            self.bump();
                            self.expect_block("finally")?;
                        }
                        Ok(())
                    }
                    "return" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        // restricted production: a newline ends the statement
                        let has_value = match self.peek() {
                            Some(t) => {
                                t.line == tok.line
                                    && t.kind != TokenKind::Punct(';')
                                    && t.kind != TokenKind::Punct('}')
                            }
                            None => false,
                        };
                        if has_value {
                            self.scan_expr(false)?;
                        } else if self.at_punct(';') {
                            self.bump();
                        }
                        Ok(())
                    }
                    "throw" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        self.scan_expr(false)
                    }
                    "break" | "continue" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        if let Some(t) = self.peek() {
                            if t.kind == TokenKind::Ident && t.line == tok.line {
                                self.bump();
                            }
                        }
                        if self.at_punct(';') {
                            self.bump();
                        }
                        Ok(())
                    }
                    "function" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.parse_function_decl()
                    }
                    "async" if self.async_function_follows(&tok) => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        self.parse_function_decl()
                    }
                    "class" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.parse_class_decl()
                    }
                    "debugger" => {
                        if probe {
                            self.probe(&tok);
                        }
                        self.bump();
                        if self.at_punct(';') {
                            self.bump();
                        }
                        Ok(())
                    }
                    TRACE_HOOK if matches!(self.peek_at(1), Some(t) if t.kind == TokenKind::Punct('(')) =>
                    {
                        // an existing probe; consume without re-probing
                        self.scan_expr(false)
                    }
                    _ => {
                        if matches!(self.peek_at(1), Some(t) if t.kind == TokenKind::Punct(':')) {
                            // labeled statement: probe once, before the label
                            if probe {
                                self.probe(&tok);
                            }
                            self.bump();
                            self.bump();
                            return self.parse_statement(false);
                        }
                        if probe {
                            self.probe(&tok);
                        }
                        self.scan_expr(false)
                    }
                }
            }
            _ => {
                if probe {
                    self.probe(&tok);
                }
                self.scan_expr(false)
            }
        }
    }

    /// `let` and `const` are only declarations when a binding follows;
    /// `let` in particular is a valid identifier in sloppy mode.
    fn decl_follows(&self) -> bool {
        matches!(
            self.peek_at(1),
            Some(t) if t.kind == TokenKind::Ident
                || t.kind == TokenKind::Punct('[')
                || t.kind == TokenKind::Punct('{')
        )
    }

    fn async_function_follows(&self, async_tok: &Token) -> bool {
        matches!(
            self.peek_at(1),
            Some(t) if t.kind == TokenKind::Ident
                && self.token_text(t) == "function"
                && t.line == async_tok.line
        )
    }

    /// Body of `if`/`else`/`while`/`for`/`do` and labels. Unbraced bodies
    /// are wrapped in braces so the injected probe stays inside them.
    fn parse_substatement(&mut self) -> Result<(), StepscopeError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.err_eof("expected statement"));
        };
        if tok.kind == TokenKind::Punct('{') {
            self.bump();
            self.parse_statements(true)?;
            self.expect_punct('}', "block")?;
            return Ok(());
        }
        if tok.kind == TokenKind::Punct(';') {
            self.bump();
            return Ok(());
        }
        self.patches.push(Patch::Insert {
            at: tok.start,
            text: "{ ".to_string(),
        });
        self.parse_statement(true)?;
        self.patches.push(Patch::Insert {
            at: self.prev_end,
            text: " }".to_string(),
        });
        Ok(())
    }

    fn parse_var_decl(&mut self, probe: bool, kw: &Token) -> Result<(), StepscopeError> {
        if probe {
            self.probe(kw);
        }
        if self.token_text(kw) != "var" {
            self.patches.push(Patch::Replace {
                start: kw.start,
                end: kw.end,
                text: "var",
            });
        }
        self.bump();
        loop {
            self.parse_binding_pattern()?;
            if self.at_punct('=') {
                self.bump();
                self.scan_expr(true)?;
            }
            if self.at_punct(',') {
                self.bump();
                continue;
            }
            break;
        }
        if self.at_punct(';') {
            self.bump();
        }
        Ok(())
    }

    fn parse_for_head(&mut self) -> Result<(), StepscopeError> {
        self.expect_punct('(', "for header")?;
        if let Some(kw) = self.peek().cloned() {
            if kw.kind == TokenKind::Ident
                && matches!(self.token_text(&kw), "var" | "let" | "const")
                && self.decl_follows()
            {
                if self.token_text(&kw) != "var" {
                    self.patches.push(Patch::Replace {
                        start: kw.start,
                        end: kw.end,
                        text: "var",
                    });
                }
                self.bump();
                loop {
                    self.parse_binding_pattern()?;
                    if self.at_ident("of") || self.at_ident("in") {
                        break;
                    }
                    if self.at_punct('=') {
                        self.bump();
                        self.scan_expr(true)?;
                    }
                    if self.at_punct(',') {
                        self.bump();
                        continue;
                    }
                    break;
                }
            }
        }
        // consume whatever remains of the header up to the matching ')'
        let mut depth = 1i32;
        loop {
            match self.peek() {
                None => return Err(self.err_eof("unterminated for header")),
                Some(t) if depth == 1 && t.kind == TokenKind::Punct(')') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => self.scan_expr_token(&mut depth)?,
            }
        }
    }

    fn parse_switch_body(&mut self) -> Result<(), StepscopeError> {
        self.expect_punct('{', "switch body")?;
        loop {
            let Some(tok) = self.peek().cloned() else {
                return Err(self.err_eof("unterminated switch body"));
            };
            if tok.kind == TokenKind::Punct('}') {
                self.bump();
                return Ok(());
            }
            if tok.kind == TokenKind::Ident && self.token_text(&tok) == "case" {
                self.bump();
                self.scan_case_expr()?;
                self.expect_punct(':', "case clause")?;
                continue;
            }
            if tok.kind == TokenKind::Ident && self.token_text(&tok) == "default" {
                self.bump();
                self.expect_punct(':', "default clause")?;
                continue;
            }
            self.parse_statement(true)?;
        }
    }

    /// Case test expression, up to the clause colon. Conditional
    /// expressions inside the test keep their own colons.
    fn scan_case_expr(&mut self) -> Result<(), StepscopeError> {
        let mut depth = 0i32;
        let mut pending_ternary = 0u32;
        loop {
            let Some(tok) = self.peek().cloned() else {
                return Err(self.err_eof("unterminated case expression"));
            };
            if depth == 0 {
                match tok.kind {
                    TokenKind::Punct(':') if pending_ternary == 0 => return Ok(()),
                    TokenKind::Punct(':') => {
                        pending_ternary -= 1;
                        self.bump();
                        continue;
                    }
                    TokenKind::Punct('?') => {
                        pending_ternary += 1;
                        self.bump();
                        continue;
                    }
                    _ => {}
                }
            }
            self.scan_expr_token(&mut depth)?;
        }
    }

    fn parse_function_decl(&mut self) -> Result<(), StepscopeError> {
        self.bump(); // function
        if self.at_punct('*') {
            self.bump();
        }
        if matches!(self.peek(), Some(t) if t.kind == TokenKind::Ident) {
            // function declarations keep their function-scope binding; the
            // name is deliberately not seeded onto the sandbox
            self.bump();
        }
        self.scan_parens("function parameters")?;
        self.parse_function_block()
    }

    fn parse_class_decl(&mut self) -> Result<(), StepscopeError> {
        self.bump(); // class
        if matches!(self.peek(), Some(t) if t.kind == TokenKind::Ident && self.token_text(t) != "extends")
        {
            self.bump();
        }
        if self.at_ident("extends") {
            self.bump();
            let mut depth = 0i32;
            loop {
                match self.peek() {
                    None => return Err(self.err_eof("unterminated class heritage")),
                    Some(t) if depth == 0 && t.kind == TokenKind::Punct('{') => break,
                    Some(_) => self.scan_expr_token(&mut depth)?,
                }
            }
        }
        self.expect_punct('{', "class body")?;
        let mut depth = 1i32;
        loop {
            match self.peek() {
                None => return Err(self.err_eof("unterminated class body")),
                Some(t) if depth == 1 && t.kind == TokenKind::Punct('}') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => self.scan_expr_token(&mut depth)?,
            }
        }
    }

    fn parse_function_block(&mut self) -> Result<(), StepscopeError> {
        self.fn_depth += 1;
        let result = (|| {
            self.expect_punct('{', "function body")?;
            self.parse_statements(true)?;
            self.expect_punct('}', "function body")?;
            Ok(())
        })();
        self.fn_depth -= 1;
        result
    }

    fn expect_block(&mut self, context: &str) -> Result<(), StepscopeError> {
        self.expect_punct('{', context)?;
        self.parse_statements(true)?;
        self.expect_punct('}', context)?;
        Ok(())
    }

    // ---- binding patterns --------------------------------------------

    fn parse_binding_pattern(&mut self) -> Result<(), StepscopeError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.err_eof("expected binding pattern"));
        };
        match tok.kind {
            TokenKind::Ident => {
                let name = self.token_text(&tok).to_string();
                self.record_seed(&name);
                self.bump();
                Ok(())
            }
            TokenKind::Punct('[') => {
                self.bump();
                loop {
                    let Some(t) = self.peek().cloned() else {
                        return Err(self.err_eof("unterminated array pattern"));
                    };
                    match t.kind {
                        TokenKind::Punct(']') => {
                            self.bump();
                            return Ok(());
                        }
                        TokenKind::Punct(',') => {
                            self.bump();
                        }
                        TokenKind::Punct('.') => {
                            // rest element
                            while self.at_punct('.') {
                                self.bump();
                            }
                            self.parse_binding_pattern()?;
                        }
                        _ => {
                            self.parse_binding_pattern()?;
                            if self.at_punct('=') {
                                self.bump();
                                self.scan_expr(true)?;
                            }
                        }
                    }
                }
            }
            TokenKind::Punct('{') => {
                self.bump();
                loop {
                    let Some(t) = self.peek().cloned() else {
                        return Err(self.err_eof("unterminated object pattern"));
                    };
                    match t.kind {
                        TokenKind::Punct('}') => {
                            self.bump();
                            return Ok(());
                        }
                        TokenKind::Punct(',') => {
                            self.bump();
                        }
                        TokenKind::Punct('.') => {
                            while self.at_punct('.') {
                                self.bump();
                            }
                            self.parse_binding_pattern()?;
                        }
                        TokenKind::Punct('[') => {
                            // computed key
                            let mut depth = 0i32;
                            self.scan_expr_token(&mut depth)?;
                            while depth > 0 {
                                if self.peek().is_none() {
                                    return Err(self.err_eof("unterminated computed key"));
                                }
                                self.scan_expr_token(&mut depth)?;
                            }
                            self.expect_punct(':', "object pattern")?;
                            self.parse_binding_pattern()?;
                            if self.at_punct('=') {
                                self.bump();
                                self.scan_expr(true)?;
                            }
                        }
                        TokenKind::Ident | TokenKind::Str | TokenKind::Number => {
                            let key = self.token_text(&t).to_string();
                            let key_is_ident = t.kind == TokenKind::Ident;
                            self.bump();
                            if self.at_punct(':') {
                                self.bump();
                                self.parse_binding_pattern()?;
                            } else if key_is_ident {
                                // shorthand: the key is the binding
                                self.record_seed(&key);
                            }
                            if self.at_punct('=') {
                                self.bump();
                                self.scan_expr(true)?;
                            }
                        }
                        _ => {
                            return Err(
                                self.err_at(t.line, "unexpected token in object pattern")
                            );
                        }
                    }
                }
            }
            _ => Err(self.err_at(tok.line, "expected binding pattern")),
        }
    }

    // ---- expressions --------------------------------------------------

    /// Consume a balanced `( ... )` group, recursing into any function
    /// bodies it contains.
    fn scan_parens(&mut self, context: &str) -> Result<(), StepscopeError> {
        self.expect_punct('(', context)?;
        let mut depth = 1i32;
        loop {
            match self.peek() {
                None => return Err(self.err_eof(format!("unterminated {context}"))),
                Some(t) if depth == 1 && t.kind == TokenKind::Punct(')') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => self.scan_expr_token(&mut depth)?,
            }
        }
    }

    /// Consume an expression. With `in_subexpr`, stop (without consuming)
    /// at `,`, `;`, `)`, `]` or `}` at depth zero — the caller owns the
    /// delimiter. At statement level, `;` is consumed, `}` is left for
    /// the enclosing block, and a newline terminates the statement when
    /// the previous token can end an expression and the next cannot
    /// continue one.
    fn scan_expr(&mut self, in_subexpr: bool) -> Result<(), StepscopeError> {
        let mut depth = 0i32;
        let mut first = true;
        loop {
            let Some(tok) = self.peek().cloned() else {
                if depth == 0 {
                    return Ok(());
                }
                return Err(self.err_eof("unterminated expression"));
            };
            if depth == 0 {
                match tok.kind {
                    TokenKind::Punct(';') => {
                        if !in_subexpr {
                            self.bump();
                        }
                        return Ok(());
                    }
                    TokenKind::Punct('}') => return Ok(()),
                    TokenKind::Punct(',') if in_subexpr => return Ok(()),
                    TokenKind::Punct(')' | ']') => {
                        if in_subexpr {
                            return Ok(());
                        }
                        return Err(self.err_at(tok.line, "unexpected closing bracket"));
                    }
                    _ => {}
                }
                if !first && self.newline_terminates(&tok) {
                    return Ok(());
                }
            }
            self.scan_expr_token(&mut depth)?;
            first = false;
        }
    }

    /// Consume one token in expression position, recursing into function
    /// bodies so their statements are instrumented too.
    fn scan_expr_token(&mut self, depth: &mut i32) -> Result<(), StepscopeError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.err_eof("unterminated expression"));
        };
        match tok.kind {
            TokenKind::Ident if self.token_text(&tok) == "function" => {
                self.bump();
                if self.at_punct('*') {
                    self.bump();
                }
                if matches!(self.peek(), Some(t) if t.kind == TokenKind::Ident) {
                    self.bump();
                }
                self.scan_parens("function parameters")?;
                self.parse_function_block()
            }
            TokenKind::Ident if self.token_text(&tok) == "async" && self.async_function_follows(&tok) => {
                self.bump();
                self.scan_expr_token(depth)
            }
            TokenKind::Arrow => {
                self.bump();
                if self.at_punct('{') {
                    self.parse_function_block()
                } else {
                    Ok(())
                }
            }
            TokenKind::Punct('(' | '[' | '{') => {
                *depth += 1;
                self.bump();
                Ok(())
            }
            TokenKind::Punct(')' | ']' | '}') => {
                *depth -= 1;
                if *depth < 0 {
                    return Err(self.err_at(tok.line, "unbalanced brackets"));
                }
                self.bump();
                Ok(())
            }
            _ => {
                self.bump();
                Ok(())
            }
        }
    }

    fn newline_terminates(&self, next: &Token) -> bool {
        let Some(prev) = &self.last else {
            return false;
        };
        if next.line == prev.line {
            return false;
        }
        can_end_expression(prev, self.src) && !continues_expression(next, self.src)
    }
}

fn can_end_expression(token: &Token, src: &str) -> bool {
    match token.kind {
        TokenKind::Ident => !matches!(
            &src[token.start..token.end],
            "new" | "typeof" | "delete" | "void" | "in" | "of" | "instanceof" | "await"
                | "yield" | "throw" | "return" | "case" | "do" | "else"
        ),
        TokenKind::Number | TokenKind::Str | TokenKind::Template | TokenKind::Regex => true,
        TokenKind::Punct(c) => matches!(c, ')' | ']' | '}'),
        TokenKind::Arrow => false,
    }
}

fn continues_expression(token: &Token, src: &str) -> bool {
    match token.kind {
        TokenKind::Arrow | TokenKind::Template => true,
        TokenKind::Ident => matches!(&src[token.start..token.end], "in" | "of" | "instanceof"),
        TokenKind::Punct(c) => matches!(
            c,
            '.' | ',' | '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '&' | '|' | '^' | '?'
                | ':' | '(' | '['
        ),
        _ => false,
    }
}
