use super::token::{CSSToken, HashType, SpannedToken};

/// [§ 4.3 Tokenizer Algorithms](https://www.w3.org/TR/css-syntax-3/#tokenizer-algorithms)
///
/// CSS tokenizer following CSS Syntax Module Level 3.
///
/// Decisions are made by peeking before consuming, so every token's span
/// starts at the first code point that belongs to it.
pub struct CSSTokenizer {
    /// The input as code points
    input: Vec<char>,
    /// Byte offset of each code point, plus one trailing entry for the end
    offsets: Vec<usize>,
    /// Current position in `input`
    position: usize,
    /// Collected tokens
    tokens: Vec<SpannedToken>,
}

impl CSSTokenizer {
    /// Create a new CSS tokenizer with the given input.
    #[must_use]
    pub fn new(input: &str) -> Self {
        let mut chars = Vec::with_capacity(input.len());
        let mut offsets = Vec::with_capacity(input.len() + 1);
        for (offset, c) in input.char_indices() {
            chars.push(c);
            offsets.push(offset);
        }
        offsets.push(input.len());
        Self {
            input: chars,
            offsets,
            position: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the whole input. The last token is always [`CSSToken::EOF`].
    pub fn run(&mut self) {
        loop {
            // "Consume comments."
            self.consume_comments();
            let start = self.byte_offset();
            let token = self.consume_token();
            let is_eof = token.is_eof();
            self.tokens.push(SpannedToken {
                token,
                span: start..self.byte_offset(),
            });
            if is_eof {
                break;
            }
        }
    }

    /// Return the collected tokens.
    #[must_use]
    pub fn into_tokens(self) -> Vec<SpannedToken> {
        self.tokens
    }

    /// Return a reference to the collected tokens.
    #[must_use]
    pub fn tokens(&self) -> &[SpannedToken] {
        &self.tokens
    }

    /// [§ 4.3.1 Consume a token](https://www.w3.org/TR/css-syntax-3/#consume-token)
    ///
    /// "This section describes how to consume a token from a stream of code points.
    /// It will return a single token of any type."
    fn consume_token(&mut self) -> CSSToken {
        let Some(c) = self.peek() else {
            return CSSToken::EOF;
        };

        match c {
            // "whitespace"
            // "Consume as much whitespace as possible. Return a <whitespace-token>."
            c if is_whitespace(c) => {
                self.consume_whitespace();
                CSSToken::Whitespace
            }

            // "U+0022 QUOTATION MARK (")" / "U+0027 APOSTROPHE (')"
            // "Consume a string token and return it."
            '"' | '\'' => {
                self.advance(1);
                self.consume_string_token(c)
            }

            // "U+0023 NUMBER SIGN (#)"
            '#' => {
                // "If the next input code point is an ident code point or the next
                // two input code points are a valid escape..."
                if self.peek_at(1).is_some_and(is_ident_code_point)
                    || self.is_valid_escape_at(1)
                {
                    self.advance(1);
                    // "If the next 3 input code points would start an ident sequence,
                    // set the <hash-token>'s type flag to 'id'."
                    let hash_type = if self.would_start_ident_sequence_at(0) {
                        HashType::Id
                    } else {
                        HashType::Unrestricted
                    };
                    let value = self.consume_ident_sequence();
                    CSSToken::Hash { value, hash_type }
                } else {
                    self.advance(1);
                    CSSToken::Delim('#')
                }
            }

            '(' => self.single(CSSToken::LeftParen),
            ')' => self.single(CSSToken::RightParen),
            ',' => self.single(CSSToken::Comma),
            ':' => self.single(CSSToken::Colon),
            ';' => self.single(CSSToken::Semicolon),
            '[' => self.single(CSSToken::LeftBracket),
            ']' => self.single(CSSToken::RightBracket),
            '{' => self.single(CSSToken::LeftBrace),
            '}' => self.single(CSSToken::RightBrace),

            // "U+002B PLUS SIGN (+)" / "U+002E FULL STOP (.)"
            // "If the input stream starts with a number, reconsume the current
            // input code point, consume a numeric token, and return it."
            '+' | '.' => {
                if self.would_start_number_at(0) {
                    self.consume_numeric_token()
                } else {
                    self.single(CSSToken::Delim(c))
                }
            }

            // "U+002D HYPHEN-MINUS (-)"
            '-' => {
                if self.would_start_number_at(0) {
                    self.consume_numeric_token()
                }
                // "Otherwise, if the next 2 input code points are U+002D U+003E (->)..."
                else if self.peek_at(1) == Some('-') && self.peek_at(2) == Some('>') {
                    self.advance(3);
                    CSSToken::CDC
                }
                // "Otherwise, if the input stream starts with an ident sequence..."
                else if self.would_start_ident_sequence_at(0) {
                    self.consume_ident_like_token()
                } else {
                    self.single(CSSToken::Delim('-'))
                }
            }

            // "U+003C LESS-THAN SIGN (<)"
            '<' => {
                if self.peek_at(1) == Some('!')
                    && self.peek_at(2) == Some('-')
                    && self.peek_at(3) == Some('-')
                {
                    self.advance(4);
                    CSSToken::CDO
                } else {
                    self.single(CSSToken::Delim('<'))
                }
            }

            // "U+0040 COMMERCIAL AT (@)"
            '@' => {
                if self.would_start_ident_sequence_at(1) {
                    self.advance(1);
                    CSSToken::AtKeyword(self.consume_ident_sequence())
                } else {
                    self.single(CSSToken::Delim('@'))
                }
            }

            // "U+005C REVERSE SOLIDUS (\)"
            '\\' => {
                if self.is_valid_escape_at(0) {
                    self.consume_ident_like_token()
                } else {
                    // "This is a parse error."
                    self.single(CSSToken::Delim('\\'))
                }
            }

            c if c.is_ascii_digit() => self.consume_numeric_token(),

            c if is_ident_start_code_point(c) => self.consume_ident_like_token(),

            // "anything else"
            c => self.single(CSSToken::Delim(c)),
        }
    }

    /// Consume one code point and return `token`.
    fn single(&mut self, token: CSSToken) -> CSSToken {
        self.advance(1);
        token
    }

    /// [§ 4.3.2 Consume comments](https://www.w3.org/TR/css-syntax-3/#consume-comment)
    ///
    /// "If the next two input code points are U+002F SOLIDUS (/) followed by
    /// U+002A ASTERISK (*), consume them and all following code points up to
    /// and including the first U+002A ASTERISK (*) followed by U+002F SOLIDUS (/),
    /// or up to an EOF code point."
    fn consume_comments(&mut self) {
        while self.peek() == Some('/') && self.peek_at(1) == Some('*') {
            self.advance(2);
            loop {
                match self.consume() {
                    Some('*') if self.peek() == Some('/') => {
                        self.advance(1);
                        break;
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    fn consume_whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            self.advance(1);
        }
    }

    /// [§ 4.3.4 Consume a string token](https://www.w3.org/TR/css-syntax-3/#consume-string-token)
    fn consume_string_token(&mut self, ending_code_point: char) -> CSSToken {
        let mut value = String::new();

        loop {
            match self.peek() {
                // "ending code point" / "EOF"
                Some(c) if c == ending_code_point => {
                    self.advance(1);
                    return CSSToken::String(value);
                }
                None => return CSSToken::String(value),

                // "newline"
                // "This is a parse error. Reconsume the current input code point,
                // create a <bad-string-token>, and return it."
                Some('\n' | '\r' | '\x0C') => return CSSToken::BadString,

                // "U+005C REVERSE SOLIDUS (\)"
                Some('\\') => match self.peek_at(1) {
                    None => self.advance(1),
                    Some('\n') => self.advance(2),
                    Some(_) => {
                        self.advance(1);
                        value.push(self.consume_escaped_code_point());
                    }
                },

                Some(c) => {
                    self.advance(1);
                    value.push(c);
                }
            }
        }
    }

    /// [§ 4.3.3 Consume a numeric token](https://www.w3.org/TR/css-syntax-3/#consume-numeric-token)
    fn consume_numeric_token(&mut self) -> CSSToken {
        let (value, integer) = self.consume_number();

        if self.would_start_ident_sequence_at(0) {
            let unit = self.consume_ident_sequence();
            CSSToken::Dimension {
                value,
                integer,
                unit,
            }
        } else if self.peek() == Some('%') {
            self.advance(1);
            CSSToken::Percentage { value }
        } else {
            CSSToken::Number { value, integer }
        }
    }

    /// [§ 4.3.4 Consume an ident-like token](https://www.w3.org/TR/css-syntax-3/#consume-ident-like-token)
    fn consume_ident_like_token(&mut self) -> CSSToken {
        let string = self.consume_ident_sequence();

        if self.peek() != Some('(') {
            return CSSToken::Ident(string);
        }
        self.advance(1);

        // "If string's value is an ASCII case-insensitive match for 'url'..."
        if string.eq_ignore_ascii_case("url") {
            // "While the next two input code points are whitespace, consume the
            // next input code point."
            let mut lookahead = 0;
            while self.peek_at(lookahead).is_some_and(is_whitespace) {
                lookahead += 1;
            }
            // "If the next one or two input code points are U+0022 QUOTATION MARK,
            // U+0027 APOSTROPHE, or whitespace followed by either, return a
            // <function-token>."
            if !matches!(self.peek_at(lookahead), Some('"' | '\'')) {
                return self.consume_url_token();
            }
        }
        CSSToken::Function(string)
    }

    /// [§ 4.3.6 Consume a url token](https://www.w3.org/TR/css-syntax-3/#consume-url-token)
    fn consume_url_token(&mut self) -> CSSToken {
        let mut value = String::new();
        self.consume_whitespace();

        loop {
            match self.consume() {
                Some(')') | None => return CSSToken::Url(value),

                Some(c) if is_whitespace(c) => {
                    self.consume_whitespace();
                    return match self.peek() {
                        Some(')') => {
                            self.advance(1);
                            CSSToken::Url(value)
                        }
                        None => CSSToken::Url(value),
                        Some(_) => {
                            self.consume_bad_url_remnants();
                            CSSToken::BadUrl
                        }
                    };
                }

                Some('"' | '\'' | '(') => {
                    self.consume_bad_url_remnants();
                    return CSSToken::BadUrl;
                }

                Some('\\') => {
                    if self.peek().is_some_and(|c| c != '\n') {
                        value.push(self.consume_escaped_code_point());
                    } else {
                        self.consume_bad_url_remnants();
                        return CSSToken::BadUrl;
                    }
                }

                Some(c) => value.push(c),
            }
        }
    }

    /// [§ 4.3.14 Consume the remnants of a bad url](https://www.w3.org/TR/css-syntax-3/#consume-remnants-of-bad-url)
    fn consume_bad_url_remnants(&mut self) {
        loop {
            match self.consume() {
                Some(')') | None => return,
                Some('\\') if self.peek().is_some_and(|c| c != '\n') => {
                    let _ = self.consume_escaped_code_point();
                }
                Some(_) => {}
            }
        }
    }

    /// [§ 4.3.11 Consume an ident sequence](https://www.w3.org/TR/css-syntax-3/#consume-name)
    fn consume_ident_sequence(&mut self) -> String {
        let mut result = String::new();
        loop {
            match self.peek() {
                Some(c) if is_ident_code_point(c) => {
                    self.advance(1);
                    result.push(c);
                }
                Some('\\') if self.is_valid_escape_at(0) => {
                    self.advance(1);
                    result.push(self.consume_escaped_code_point());
                }
                _ => return result,
            }
        }
    }

    /// [§ 4.3.12 Consume a number](https://www.w3.org/TR/css-syntax-3/#consume-number)
    ///
    /// Returns the value and whether the type flag is "integer".
    fn consume_number(&mut self) -> (f64, bool) {
        let mut integer = true;
        let mut repr = String::new();

        if let Some(sign @ ('+' | '-')) = self.peek() {
            self.advance(1);
            repr.push(sign);
        }
        self.consume_digits(&mut repr);

        // "If the next 2 input code points are U+002E FULL STOP (.) followed by a digit..."
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
            repr.push('.');
            self.consume_digits(&mut repr);
            integer = false;
        }

        // "If the next 2 or 3 input code points are U+0045 (E) or U+0065 (e),
        // optionally followed by U+002D (-) or U+002B (+), followed by a digit..."
        if let Some(e @ ('e' | 'E')) = self.peek() {
            let sign = self.peek_at(1).filter(|c| matches!(c, '+' | '-'));
            let digit_at = if sign.is_some() { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.advance(digit_at);
                repr.push(e);
                if let Some(sign) = sign {
                    repr.push(sign);
                }
                self.consume_digits(&mut repr);
                integer = false;
            }
        }

        (repr.parse().unwrap_or(0.0), integer)
    }

    fn consume_digits(&mut self, repr: &mut String) {
        while let Some(digit) = self.peek().filter(char::is_ascii_digit) {
            self.advance(1);
            repr.push(digit);
        }
    }

    /// [§ 4.3.7 Consume an escaped code point](https://www.w3.org/TR/css-syntax-3/#consume-escaped-code-point)
    ///
    /// Expects the reverse solidus to have been consumed already.
    fn consume_escaped_code_point(&mut self) -> char {
        match self.consume() {
            Some(c) if c.is_ascii_hexdigit() => {
                let mut hex = String::from(c);
                // "Consume as many hex digits as possible, but no more than 5."
                while hex.len() < 6 {
                    match self.peek().filter(char::is_ascii_hexdigit) {
                        Some(digit) => {
                            self.advance(1);
                            hex.push(digit);
                        }
                        None => break,
                    }
                }
                // "If the next input code point is whitespace, consume it as well."
                if self.peek().is_some_and(is_whitespace) {
                    self.advance(1);
                }
                // "If this number is zero, or is for a surrogate, or is greater than
                // the maximum allowed code point, return U+FFFD REPLACEMENT CHARACTER."
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|&n| n != 0)
                    .and_then(char::from_u32)
                    .unwrap_or('\u{FFFD}')
            }
            // "EOF": "This is a parse error. Return U+FFFD REPLACEMENT CHARACTER."
            None => '\u{FFFD}',
            Some(c) => c,
        }
    }

    /// [§ 4.3.8 Check if two code points are a valid escape](https://www.w3.org/TR/css-syntax-3/#starts-with-a-valid-escape)
    fn is_valid_escape_at(&self, offset: usize) -> bool {
        self.peek_at(offset) == Some('\\') && self.peek_at(offset + 1) != Some('\n')
    }

    /// [§ 4.3.9 Check if three code points would start an ident sequence](https://www.w3.org/TR/css-syntax-3/#would-start-an-identifier)
    fn would_start_ident_sequence_at(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            Some('-') => {
                let second = self.peek_at(offset + 1);
                second.is_some_and(is_ident_start_code_point)
                    || second == Some('-')
                    || self.is_valid_escape_at(offset + 1)
            }
            Some(c) if is_ident_start_code_point(c) => true,
            Some('\\') => self.is_valid_escape_at(offset),
            _ => false,
        }
    }

    /// [§ 4.3.10 Check if three code points would start a number](https://www.w3.org/TR/css-syntax-3/#starts-with-a-number)
    fn would_start_number_at(&self, offset: usize) -> bool {
        let digit_at = |i: usize| self.peek_at(i).is_some_and(|c| c.is_ascii_digit());
        match self.peek_at(offset) {
            Some('+' | '-') => {
                digit_at(offset + 1)
                    || (self.peek_at(offset + 1) == Some('.') && digit_at(offset + 2))
            }
            Some('.') => digit_at(offset + 1),
            Some(c) => c.is_ascii_digit(),
            None => false,
        }
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        Some(c)
    }

    fn advance(&mut self, count: usize) {
        self.position = (self.position + count).min(self.input.len());
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn byte_offset(&self) -> usize {
        self.offsets.get(self.position).copied().unwrap_or_default()
    }
}

/// [§ 4.2 Definitions - whitespace](https://www.w3.org/TR/css-syntax-3/#whitespace)
///
/// "A newline, U+0009 CHARACTER TABULATION, or U+0020 SPACE." Carriage
/// returns and form feeds count as newlines after preprocessing.
const fn is_whitespace(c: char) -> bool {
    matches!(c, '\n' | '\t' | ' ' | '\r' | '\x0C')
}

/// [§ 4.2 Definitions - ident-start code point](https://www.w3.org/TR/css-syntax-3/#ident-start-code-point)
///
/// "A letter, a non-ASCII code point, or U+005F LOW LINE (_)."
const fn is_ident_start_code_point(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

/// [§ 4.2 Definitions - ident code point](https://www.w3.org/TR/css-syntax-3/#ident-code-point)
///
/// "An ident-start code point, a digit, or U+002D HYPHEN-MINUS (-)."
const fn is_ident_code_point(c: char) -> bool {
    is_ident_start_code_point(c) || c.is_ascii_digit() || c == '-'
}
