/// One word of a filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lexeme {
    pub text: String,
    /// 1-based position in the expression, used in error messages
    pub position: usize,
}
impl Lexeme {
    /// Case-insensitive comparison against a keyword
    pub fn is(&self, keyword: &str) -> bool {
        self.text.eq_ignore_ascii_case(keyword)
    }
}

/// Splits the command line tokens into lexemes
///
/// Tokens are split on whitespace, and `(`, `)` and `!` always stand alone
/// so `!(tcp` and `! ( tcp` read the same.
pub(crate) fn lex<S: AsRef<str>>(tokens: &[S]) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let push = |text: &str, lexemes: &mut Vec<Lexeme>| {
        if !text.is_empty() {
            let position = lexemes.len() + 1;
            lexemes.push(Lexeme {
                text: text.to_owned(),
                position,
            });
        }
    };
    for token in tokens {
        let token = token.as_ref();
        let mut start = 0;
        for (index, ch) in token.char_indices() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '!') {
                push(&token[start..index], &mut lexemes);
                if !ch.is_whitespace() {
                    push(&token[index..index + ch.len_utf8()], &mut lexemes);
                }
                start = index + ch.len_utf8();
            }
        }
        push(&token[start..], &mut lexemes);
    }
    lexemes
}
