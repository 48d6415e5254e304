use crate::pipeline::fileset::FileSet;
use crate::pipeline::stage::{Stage, StageContext, StageError, StageFuture};

/// Re-emits CSS in compressed form (comments removed).
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyCss;

impl MinifyCss {
    pub fn minify(css: &str) -> Result<String, StageError> {
        let options = grass::Options::default().style(grass::OutputStyle::Compressed);
        grass::from_string(css.to_string(), &options).map_err(|e| StageError::new(e.to_string()))
    }
}

impl Stage for MinifyCss {
    fn name(&self) -> &str {
        "minify_css"
    }

    fn apply<'a>(&'a self, _ctx: &'a StageContext, files: FileSet) -> StageFuture<'a> {
        let result = files.try_filter_map(|mut file| {
            let css = Self::minify(&file.text()).map_err(|e| {
                StageError::new(format!("{}: {}", file.display_path().display(), e))
            })?;
            file.contents = css.into_bytes();
            Ok(Some(file))
        });
        Box::pin(async move { result })
    }
}

/// Conservative JS minifier: drops comments and blank lines, trims
/// indentation, and keeps line breaks so automatic semicolon insertion
/// behaves exactly as in the source. `/*! ... */` comments are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyJs;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    Str(char),
    Block { keep: bool },
}

impl MinifyJs {
    pub fn minify(source: &str) -> String {
        let stripped = strip_comments(source);
        let mut out = String::with_capacity(stripped.len());
        for line in stripped.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn strip_comments(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut state = Lexical::Code;
    let mut line_has_code = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match state {
            Lexical::Code => match (c, next) {
                ('/', Some('*')) => {
                    let keep = chars.get(i + 2) == Some(&'!');
                    if keep {
                        out.push_str("/*");
                    }
                    state = Lexical::Block { keep };
                    i += 2;
                    continue;
                }
                ('/', Some('/')) if !line_has_code => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                // Trailing comment: kept as is, and its quotes open no string.
                ('/', Some('/')) => {
                    while i < chars.len() && chars[i] != '\n' {
                        out.push(chars[i]);
                        i += 1;
                    }
                    continue;
                }
                ('"' | '\'' | '`', _) => {
                    state = Lexical::Str(c);
                    line_has_code = true;
                    out.push(c);
                }
                ('\n', _) => {
                    line_has_code = false;
                    out.push(c);
                }
                _ => {
                    if !c.is_whitespace() {
                        line_has_code = true;
                    }
                    out.push(c);
                }
            },
            Lexical::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = next {
                        out.push(escaped);
                        i += 2;
                        continue;
                    }
                } else if c == quote {
                    state = Lexical::Code;
                }
            }
            Lexical::Block { keep } => {
                if c == '*' && next == Some('/') {
                    if keep {
                        out.push_str("*/");
                    }
                    state = Lexical::Code;
                    i += 2;
                    continue;
                }
                if keep || c == '\n' {
                    out.push(c);
                    if c == '\n' {
                        line_has_code = false;
                    }
                }
            }
        }

        i += 1;
    }

    out
}

impl Stage for MinifyJs {
    fn name(&self) -> &str {
        "minify_js"
    }

    fn apply<'a>(&'a self, _ctx: &'a StageContext, files: FileSet) -> StageFuture<'a> {
        let result = files.try_filter_map(|mut file| {
            file.contents = Self::minify(&file.text()).into_bytes();
            Ok::<_, StageError>(Some(file))
        });
        Box::pin(async move { result })
    }
}
