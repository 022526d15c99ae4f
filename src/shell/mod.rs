//! Structured shell commands.
//!
//! A [`Cmd`] keeps the program, its arguments, environment assignments and
//! an optional output redirection apart until it is rendered, so quoting
//! happens in exactly one place. Words marked secret render in full for
//! execution but as `****` everywhere a command line is shown or logged.

use std::fmt;

const MASK: &str = "****";

/// Quote a word for POSIX sh, leaving it bare when nothing in it is special.
pub fn quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,@%+".contains(&b));

    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// Reverse [`quote`] for a single word as written by this module.
pub fn unquote(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut rest = word;

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix("\\'") {
            out.push('\'');
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('\'') {
            match stripped.find('\'') {
                Some(end) => {
                    out.push_str(&stripped[..end]);
                    rest = &stripped[end + 1..];
                }
                None => {
                    out.push_str(stripped);
                    rest = "";
                }
            }
        } else {
            let end = rest.find(['\'', '\\']).unwrap_or(rest.len()).max(1);
            out.push_str(&rest[..end]);
            rest = &rest[end..];
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Word {
    Plain(String),
    Secret(String),
}

impl Word {
    fn value(&self) -> &str {
        match self {
            Word::Plain(s) | Word::Secret(s) => s,
        }
    }

    fn render(&self, redact: bool) -> String {
        match self {
            Word::Secret(_) if redact => MASK.to_string(),
            _ => quote(self.value()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Exec { program: String, args: Vec<Word> },
    /// Operator-supplied shell text, passed through untouched.
    Shell(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Redirect {
    Truncate(String),
    Append(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    env: Vec<(String, Word)>,
    body: Body,
    redirect: Option<Redirect>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            env: Vec::new(),
            body: Body::Exec {
                program: program.into(),
                args: Vec::new(),
            },
            redirect: None,
        }
    }

    /// Raw shell text. Only for lines the operator wrote themselves.
    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            env: Vec::new(),
            body: Body::Shell(line.into()),
            redirect: None,
        }
    }

    pub fn arg(self, arg: impl Into<String>) -> Self {
        self.push(Word::Plain(arg.into()))
    }

    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(self, |cmd, a| cmd.arg(a))
    }

    pub fn secret_arg(self, arg: impl Into<String>) -> Self {
        self.push(Word::Secret(arg.into()))
    }

    pub fn secret_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), Word::Secret(value.into())));
        self
    }

    /// Send stdout to `path`, replacing its contents.
    pub fn stdout_to(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(Redirect::Truncate(path.into()));
        self
    }

    /// Append stdout to `path`.
    pub fn append_to(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(Redirect::Append(path.into()));
        self
    }

    fn push(mut self, word: Word) -> Self {
        if let Body::Exec { args, .. } = &mut self.body {
            args.push(word);
        }
        self
    }

    /// Program followed by its arguments, unquoted. Raw shell text is
    /// wrapped in `sh -c`.
    pub fn argv(&self) -> Vec<String> {
        match &self.body {
            Body::Exec { program, args } => std::iter::once(program.clone())
                .chain(args.iter().map(|a| a.value().to_string()))
                .collect(),
            Body::Shell(line) => vec!["sh".to_string(), "-c".to_string(), line.clone()],
        }
    }

    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().map(|(k, v)| (k.as_str(), v.value()))
    }

    /// The command line exactly as the remote shell should run it.
    pub fn render(&self) -> String {
        self.render_with(false)
    }

    /// The command line with secret words masked.
    pub fn redacted(&self) -> String {
        self.render_with(true)
    }

    fn render_with(&self, redact: bool) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.render(redact)))
            .collect();

        match &self.body {
            Body::Exec { program, args } => {
                parts.push(quote(program));
                parts.extend(args.iter().map(|a| a.render(redact)));
            }
            Body::Shell(line) => parts.push(line.clone()),
        }

        match &self.redirect {
            Some(Redirect::Truncate(path)) => parts.push(format!("> {}", quote(path))),
            Some(Redirect::Append(path)) => parts.push(format!(">> {}", quote(path))),
            None => {}
        }

        parts.join(" ")
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_words_stay_bare() {
        assert_eq!(quote("/srv/app/live"), "/srv/app/live");
        assert_eq!(quote("--noinput"), "--noinput");
    }

    #[test]
    fn unsafe_words_are_single_quoted() {
        assert_eq!(quote(""), "''");
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn unquote_reverses_quote() {
        for word in ["plain", "a b", "it's", "x'y'z", "!-_:;.,^&", ""] {
            assert_eq!(unquote(&quote(word)), word);
        }
    }

    #[test]
    fn renders_env_program_args_and_redirect() {
        let cmd = Cmd::new("mysql")
            .secret_env("MYSQL_PWD", "hunter 2")
            .args(["-u", "root"])
            .arg("-e")
            .arg("SELECT 1;")
            .stdout_to("/tmp/out file");

        assert_eq!(
            cmd.render(),
            "MYSQL_PWD='hunter 2' mysql -u root -e 'SELECT 1;' > '/tmp/out file'"
        );
        assert_eq!(
            cmd.redacted(),
            "MYSQL_PWD=**** mysql -u root -e 'SELECT 1;' > '/tmp/out file'"
        );
    }

    #[test]
    fn display_never_shows_secrets() {
        let cmd = Cmd::new("printf").arg("%s").secret_arg("s3cr3t");
        assert!(!cmd.to_string().contains("s3cr3t"));
        assert!(cmd.render().contains("s3cr3t"));
    }

    #[test]
    fn shell_text_passes_through() {
        let cmd = Cmd::shell("echo $PATH | tr : '\\n'").append_to("/tmp/log");
        assert_eq!(cmd.render(), "echo $PATH | tr : '\\n' >> /tmp/log");
        assert_eq!(cmd.argv()[..2], ["sh".to_string(), "-c".to_string()]);
    }

    #[test]
    fn argv_is_unquoted() {
        let cmd = Cmd::new("git").args(["commit", "-m", "a message"]);
        assert_eq!(cmd.argv(), vec!["git", "commit", "-m", "a message"]);
    }
}
