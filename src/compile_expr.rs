use crate::error::CompileError;
use crate::ops::LookupArgs;
use std::iter::Peekable;
use std::str::CharIndices;

pub(crate) const STEP_DELIMITER: char = '.';
const LOOKUP_START: char = '<';
const LOOKUP_END: char = '>';
const NAME_DELIMITER: char = ':';
const ARG_DELIMITER: char = ',';
const NAMED_ARG_DELIMITER: char = '=';

#[derive(Debug, Clone, PartialEq)]
pub enum StepAst {
    /// Bare token, resolved through the registry's unnamed entry.
    Key(String),
    /// `<name:arg,key=value>`
    Call { name: String, args: LookupArgs },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawStep {
    /// Exact source substring of the step; doubles as its memoization identity.
    pub raw: String,
    pub ast: StepAst,
}

pub fn parse_path(source: &str) -> Result<Vec<RawStep>, CompileError> {
    if source.is_empty() {
        return Err(CompileError::EmptyExpression);
    }
    Parser::new(source).parse_path()
}

struct Parser<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn parse_path(&mut self) -> Result<Vec<RawStep>, CompileError> {
        let mut steps = Vec::new();
        loop {
            steps.push(self.parse_step()?);
            match self.chars.next() {
                None => break,
                Some((_, STEP_DELIMITER)) => continue,
                Some((_, other)) => {
                    return Err(self.invalid(format!(
                        "unexpected character `{other}` after `{}`",
                        steps.last().map(|s| s.raw.as_str()).unwrap_or_default()
                    )));
                }
            }
        }
        Ok(steps)
    }

    fn parse_step(&mut self) -> Result<RawStep, CompileError> {
        let start = self.offset();
        match self.chars.peek() {
            Some(&(_, LOOKUP_START)) => self.parse_lookup(start),
            _ => self.parse_key(start),
        }
    }

    /// Only a leading `<` opens a lookup, so `<` and `>` are plain key text here.
    fn parse_key(&mut self, start: usize) -> Result<RawStep, CompileError> {
        while self.chars.next_if(|&(_, c)| c != STEP_DELIMITER).is_some() {}
        let end = self.offset();
        if start == end {
            return Err(self.invalid("empty step".to_string()));
        }
        let raw = self.source[start..end].to_string();
        Ok(RawStep {
            ast: StepAst::Key(raw.clone()),
            raw,
        })
    }

    fn parse_lookup(&mut self, start: usize) -> Result<RawStep, CompileError> {
        self.chars.next(); // consume '<'
        let body_start = self.offset();
        loop {
            match self.chars.next() {
                None => return Err(self.invalid("unterminated lookup".to_string())),
                Some((_, LOOKUP_END)) => break,
                Some((_, LOOKUP_START)) => {
                    return Err(self.invalid("nested `<` inside lookup".to_string()));
                }
                Some(_) => {}
            }
        }
        let end = self.offset();
        let body = &self.source[body_start..end - LOOKUP_END.len_utf8()];
        let (name, args) = self.parse_call_body(body)?;
        Ok(RawStep {
            raw: self.source[start..end].to_string(),
            ast: StepAst::Call { name, args },
        })
    }

    fn parse_call_body(&self, body: &str) -> Result<(String, LookupArgs), CompileError> {
        let (name, arg_list) = match body.split_once(NAME_DELIMITER) {
            Some((name, rest)) => (name, Some(rest)),
            None => (body, None),
        };
        if name.is_empty() {
            return Err(self.invalid("empty lookup name".to_string()));
        }

        let mut args = LookupArgs::default();
        if let Some(arg_list) = arg_list {
            for arg in arg_list.split(ARG_DELIMITER) {
                match arg.split_once(NAMED_ARG_DELIMITER) {
                    Some((key, _)) if key.is_empty() => {
                        return Err(self.invalid(format!("named argument `{arg}` has no name")));
                    }
                    Some((key, value)) => {
                        args.named.insert(key.to_string(), value.to_string());
                    }
                    None => args.positional.push(arg.to_string()),
                }
            }
        }
        Ok((name.to_string(), args))
    }

    #[inline]
    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.source.len())
    }

    fn invalid(&self, reason: String) -> CompileError {
        CompileError::InvalidExpression {
            expr: self.source.to_string(),
            reason,
        }
    }
}
