use regex::Regex;

use crate::pipeline::fileset::FileSet;
use crate::pipeline::stage::{Stage, StageContext, StageError, StageFuture};

/// Property name -> vendor prefixes emitted ahead of the standard declaration.
const PREFIXES: &[(&str, &[&str])] = &[
    ("animation", &["-webkit-"]),
    ("appearance", &["-webkit-", "-moz-"]),
    ("backface-visibility", &["-webkit-"]),
    ("box-sizing", &["-webkit-", "-moz-"]),
    ("transform", &["-webkit-", "-ms-"]),
    ("transition", &["-webkit-"]),
    ("user-select", &["-webkit-", "-moz-", "-ms-"]),
];

/// Adds vendor-prefixed copies of a fixed set of properties.
///
/// Works on expanded CSS, one declaration per line. Declarations that
/// already start with `-` are never touched.
#[derive(Debug, Clone)]
pub struct Autoprefix {
    declaration: Regex,
}

impl Autoprefix {
    pub fn new() -> Result<Self, StageError> {
        let names: Vec<&str> = PREFIXES.iter().map(|(name, _)| *name).collect();
        let pattern = format!(
            r"(?m)^([ \t]*)({})[ \t]*:[ \t]*([^;{{}}\n]+);",
            names.join("|")
        );
        let declaration = Regex::new(&pattern)
            .map_err(|e| StageError::new(format!("invalid autoprefix pattern: {e}")))?;
        Ok(Self { declaration })
    }

    pub fn prefix_css(&self, css: &str) -> String {
        self.declaration
            .replace_all(css, |caps: &regex::Captures<'_>| {
                let indent = &caps[1];
                let property = &caps[2];
                let value = caps[3].trim_end();
                let vendors = PREFIXES
                    .iter()
                    .find(|(name, _)| *name == property)
                    .map(|(_, vendors)| *vendors)
                    .unwrap_or(&[]);

                let mut out = String::new();
                for vendor in vendors {
                    out.push_str(&format!("{indent}{vendor}{property}: {value};\n"));
                }
                out.push_str(&format!("{indent}{property}: {value};"));
                out
            })
            .into_owned()
    }
}

impl Stage for Autoprefix {
    fn name(&self) -> &str {
        "autoprefix"
    }

    fn apply<'a>(&'a self, _ctx: &'a StageContext, files: FileSet) -> StageFuture<'a> {
        let result = files.try_filter_map(|mut file| {
            let css = std::str::from_utf8(&file.contents).map_err(|e| {
                StageError::new(format!("{}: {}", file.display_path().display(), e))
            })?;
            file.contents = self.prefix_css(css).into_bytes();
            Ok::<_, StageError>(Some(file))
        });
        Box::pin(async move { result })
    }
}
