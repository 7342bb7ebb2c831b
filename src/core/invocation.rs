//! Invocation events: a command name plus its input parameters.
//!
//! Built by UI handlers, dispatched immediately, then dropped:
//! ```ignore
//! InvocationEvent::new("jumpto_percent")
//!     .with("percent", 50)
//!     .dispatch(&controller)?;
//! ```

use super::error::{BusError, BusResult};
use super::front_controller::FrontController;
use super::params::{ParamValue, Params};

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationEvent {
    name: String,
    params: Params,
}

impl InvocationEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.set(key, value);
        self
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.params.set(key, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Route synchronously to the front controller.
    #[must_use = "dispatch failures must be handled (log, show, or escalate)"]
    pub fn dispatch(self, controller: &FrontController) -> BusResult<Params> {
        controller.dispatch(&self)
    }

    /// Parse a script line: `name key=value key=value ...`.
    ///
    /// Values are typed loosely (int, float, bool, otherwise string).
    /// Double quotes group values containing spaces: `filename="my file.bin"`.
    pub fn parse_line(line: &str) -> BusResult<Self> {
        let tokens = split_tokens(line);
        let mut iter = tokens.into_iter();
        let name = iter
            .next()
            .ok_or_else(|| BusError::invalid("command", "empty command line"))?;
        let mut event = InvocationEvent::new(name.text);
        for token in iter {
            let Some((key, value)) = token.text.split_once('=') else {
                return Err(BusError::invalid(&token.text, "expected key=value"));
            };
            if key.is_empty() {
                return Err(BusError::invalid(&token.text, "empty key"));
            }
            // Quoting forces a string: filename="2024"
            let value = if token.quoted {
                ParamValue::Str(value.to_string())
            } else {
                ParamValue::parse_loose(value)
            };
            event.set_parameter(key, value);
        }
        Ok(event)
    }
}

/// One whitespace-separated token; `quoted` if any part of it was in quotes.
struct Token {
    text: String,
    quoted: bool,
}

fn split_tokens(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut had_quotes = false;
    for ch in line.trim().chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                had_quotes = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || had_quotes {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        quoted: had_quotes,
                    });
                    had_quotes = false;
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() || had_quotes {
        tokens.push(Token {
            text: current,
            quoted: had_quotes,
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let mut evt = InvocationEvent::new("decode_bitstream");
        evt.set_parameter("filename", "a.bin")
            .set_parameter("skip_decode", false);
        assert_eq!(evt.name(), "decode_bitstream");
        assert_eq!(evt.params().get_str("filename"), Ok("a.bin"));
        assert_eq!(evt.params().get_bool("skip_decode"), Ok(false));
    }

    #[test]
    fn test_parse_line() {
        let evt = InvocationEvent::parse_line(r#"decode_bitstream filename="my clip.bin" skip_decode=false version=HM-16.20"#)
            .unwrap();
        assert_eq!(evt.name(), "decode_bitstream");
        assert_eq!(evt.params().get_str("filename"), Ok("my clip.bin"));
        assert_eq!(evt.params().get_bool("skip_decode"), Ok(false));
        assert_eq!(evt.params().get_str("version"), Ok("HM-16.20"));

        let evt = InvocationEvent::parse_line("jumpto_percent percent=50").unwrap();
        assert_eq!(evt.params().get_int("percent"), Ok(50));
    }

    #[test]
    fn test_parse_line_quoted_values_stay_strings() {
        let evt = InvocationEvent::parse_line(r#"decode_bitstream filename="2024" version="inf" note="""#)
            .unwrap();
        assert_eq!(evt.params().get_str("filename"), Ok("2024"));
        assert_eq!(evt.params().get_str("version"), Ok("inf"));
        assert_eq!(evt.params().get_str("note"), Ok(""));
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(InvocationEvent::parse_line("   ").is_err());
        assert!(InvocationEvent::parse_line("next_frame garbage").is_err());
        assert!(InvocationEvent::parse_line("next_frame =1").is_err());
    }
}
