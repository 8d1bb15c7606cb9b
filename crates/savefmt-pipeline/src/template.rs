//! Per-file formatter arguments.
//!
//! Arguments may refer to the saved file with `{{.Basename}}`, `{{.Dirname}}` and
//! `{{.Fullname}}`:
//!
//! ```rust
//! use savefmt_pipeline::{ArgTemplate, FileParams};
//! use std::path::Path;
//!
//! let template = ArgTemplate::parse(&["ocamlformat", "--name={{.Basename}}", "-"]).unwrap();
//! let params = FileParams::from_path(Path::new("/src/lib/a.ml")).unwrap();
//! assert_eq!(
//!     template.expand(&params),
//!     vec!["ocamlformat", "--name=a.ml", "-"]
//! );
//! ```

use crate::error::TemplateError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("template action pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Basename,
    Dirname,
    Fullname,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            ".Basename" => Some(Self::Basename),
            ".Dirname" => Some(Self::Dirname),
            ".Fullname" => Some(Self::Fullname),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// The names substituted into a template for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileParams {
    /// Last path component.
    pub basename: String,
    /// Everything but the last component (`.` when there is none).
    pub dirname: String,
    /// The path as given.
    pub fullname: String,
}

impl FileParams {
    /// Derive the names from `path`, which must be UTF-8.
    pub fn from_path(path: &Path) -> Result<Self, TemplateError> {
        let utf8 = |p: &Path| {
            p.to_str()
                .map(str::to_string)
                .ok_or_else(|| TemplateError::NonUtf8Path(path.to_string_lossy().into_owned()))
        };

        let fullname = utf8(path)?;
        let basename = match path.file_name() {
            Some(name) => utf8(Path::new(name))?,
            None if fullname.is_empty() => ".".to_string(),
            None => fullname.clone(),
        };
        let dirname = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => utf8(parent)?,
            Some(_) => ".".to_string(),
            None if path.has_root() => fullname.clone(),
            None => ".".to_string(),
        };

        Ok(Self {
            basename,
            dirname,
            fullname,
        })
    }

    fn get(&self, field: Field) -> &str {
        match field {
            Field::Basename => &self.basename,
            Field::Dirname => &self.dirname,
            Field::Fullname => &self.fullname,
        }
    }
}

/// A parsed formatter command line with per-file placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTemplate {
    args: Vec<Vec<Segment>>,
}

impl ArgTemplate {
    /// Parse every argument. Unknown fields and unterminated `{{` are rejected here, so
    /// [`expand`](Self::expand) cannot fail.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, TemplateError> {
        let args = args
            .iter()
            .map(|arg| parse_arg(arg.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { args })
    }

    /// Number of arguments, program included.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether the template has no arguments at all.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Substitute `params` into every argument.
    pub fn expand(&self, params: &FileParams) -> Vec<String> {
        self.args
            .iter()
            .map(|segments| {
                segments
                    .iter()
                    .map(|segment| match segment {
                        Segment::Literal(text) => text.as_str(),
                        Segment::Field(field) => params.get(*field),
                    })
                    .collect::<String>()
            })
            .collect()
    }

    /// Expand for the file at `path`.
    pub fn expand_for(&self, path: &Path) -> Result<Vec<String>, TemplateError> {
        Ok(self.expand(&FileParams::from_path(path)?))
    }
}

fn parse_arg(arg: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in ACTION.captures_iter(arg) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_literal(&mut segments, &arg[last..whole.start()], arg)?;
        let field = Field::parse(name.as_str()).ok_or_else(|| TemplateError::UnknownField {
            field: name.as_str().to_string(),
            arg: arg.to_string(),
        })?;
        segments.push(Segment::Field(field));
        last = whole.end();
    }
    push_literal(&mut segments, &arg[last..], arg)?;
    Ok(segments)
}

fn push_literal(segments: &mut Vec<Segment>, text: &str, arg: &str) -> Result<(), TemplateError> {
    if text.contains("{{") {
        return Err(TemplateError::Unterminated(arg.to_string()));
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}
