//! Filename template engine
//!
//! A template is a file name with `{name}` placeholders drawn from a fixed set:
//! `{prefix}`, `{suffix}`, `{type}`, `{id}`, `{param}` and `{short}`. Values are
//! escaped before substitution so an identifier like `A/B` cannot introduce a
//! directory. Anything else is rejected with a [`FilenameTemplateError`].

use crate::core::error::FilenameTemplateError;
use crate::core::selection::{CombineMode, ElementType, OutputFormat};
use std::fmt::{self, Display};

/// Characters never allowed in a produced file name
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Recognized placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Prefix,
    Suffix,
    Type,
    Id,
    Param,
    Short,
}

impl Placeholder {
    pub const ALL: [Placeholder; 6] = [
        Placeholder::Prefix,
        Placeholder::Suffix,
        Placeholder::Type,
        Placeholder::Id,
        Placeholder::Param,
        Placeholder::Short,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Prefix => "prefix",
            Placeholder::Suffix => "suffix",
            Placeholder::Type => "type",
            Placeholder::Id => "id",
            Placeholder::Param => "param",
            Placeholder::Short => "short",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

/// Values bound to the placeholders for one output file
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub prefix: String,
    pub suffix: String,
    pub element_type: String,
    pub id: String,
    pub param: String,
    pub short: String,
}

impl TemplateContext {
    pub fn new(element_type: ElementType, id: &str) -> Self {
        Self {
            element_type: element_type.to_string(),
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_affixes(mut self, prefix: &str, suffix: &str) -> Self {
        self.prefix = prefix.to_string();
        self.suffix = suffix.to_string();
        self
    }

    pub fn with_param(mut self, param: &str, short: &str) -> Self {
        self.param = param.to_string();
        self.short = short.to_string();
        self
    }

    fn get(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::Prefix => &self.prefix,
            Placeholder::Suffix => &self.suffix,
            Placeholder::Type => &self.element_type,
            Placeholder::Id => &self.id,
            Placeholder::Param => &self.param,
            Placeholder::Short => &self.short,
        }
    }
}

/// A parsed, validated filename template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parse a template, rejecting unknown placeholders, unterminated braces and
    /// reserved characters in the literal text.
    pub fn parse(template: &str) -> Result<Self, FilenameTemplateError> {
        let source = template.trim().to_string();
        let mut segments = Vec::new();
        let mut rest = source.as_str();

        while let Some(open) = rest.find('{') {
            push_literal(&mut segments, &rest[..open], &source)?;
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| FilenameTemplateError::Unterminated {
                    template: source.clone(),
                })?;
            let name = &after[..close];
            let placeholder = Placeholder::from_name(name.trim()).ok_or_else(|| {
                FilenameTemplateError::UnknownPlaceholder {
                    name: name.to_string(),
                    template: source.clone(),
                }
            })?;
            segments.push(Segment::Value(placeholder));
            rest = &after[close + 1..];
        }
        push_literal(&mut segments, rest, &source)?;

        if segments.is_empty() {
            return Err(FilenameTemplateError::EmptyFilename { template: source });
        }
        Ok(Self { source, segments })
    }

    /// Structural default for a format and combine mode
    pub fn default_pattern(format: OutputFormat, mode: CombineMode) -> String {
        let ext = format.extension();
        if format.is_tabular() {
            format!("{{prefix}}{{short}}{{id}}{{suffix}}.{}", ext)
        } else if mode.groups_parameters() {
            format!("{{prefix}}{{type}}{{id}}{{suffix}}.{}", ext)
        } else {
            format!("{{prefix}}{{type}}{{id}}{{param}}{{suffix}}.{}", ext)
        }
    }

    /// The user template when given, otherwise the structural default
    pub fn for_output(
        template: Option<&str>,
        format: OutputFormat,
        mode: CombineMode,
    ) -> Result<Self, FilenameTemplateError> {
        match template.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Self::parse(t),
            None => Self::parse(&Self::default_pattern(format, mode)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholders the template uses, in order of appearance
    pub fn placeholders(&self) -> Vec<Placeholder> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Value(p) => Some(*p),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute every placeholder and return the file name
    pub fn render(&self, ctx: &TemplateContext) -> Result<String, FilenameTemplateError> {
        let mut name = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => name.push_str(text),
                Segment::Value(p) => name.push_str(&sanitize_component(ctx.get(*p))),
            }
        }

        let name = name.trim().to_string();
        let stem = match name.rfind('.') {
            Some(idx) => &name[..idx],
            None => name.as_str(),
        };
        if stem.trim_matches('.').trim().is_empty() {
            return Err(FilenameTemplateError::EmptyFilename {
                template: self.source.clone(),
            });
        }
        Ok(name)
    }
}

impl Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn push_literal(
    segments: &mut Vec<Segment>,
    text: &str,
    template: &str,
) -> Result<(), FilenameTemplateError> {
    if text.is_empty() {
        return Ok(());
    }
    if let Some(ch) = text
        .chars()
        .find(|c| RESERVED_CHARS.contains(c) || *c == '}' || c.is_control())
    {
        return Err(FilenameTemplateError::ReservedCharacter {
            ch,
            template: template.to_string(),
        });
    }
    segments.push(Segment::Literal(text.to_string()));
    Ok(())
}

/// Replace path separators, reserved and control characters with `_`
pub fn sanitize_component(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext {
        TemplateContext::new(ElementType::Node, "J1")
            .with_affixes("run_", "_v2")
            .with_param("Depth_above_invert", "D")
    }

    #[test]
    fn test_default_patterns() {
        assert_eq!(
            FilenameTemplate::default_pattern(OutputFormat::Tsf, CombineMode::Separate),
            "{prefix}{type}{id}{param}{suffix}.tsf"
        );
        assert_eq!(
            FilenameTemplate::default_pattern(OutputFormat::Tsf, CombineMode::CombinedPerElement),
            "{prefix}{type}{id}{suffix}.tsf"
        );
        assert_eq!(
            FilenameTemplate::default_pattern(OutputFormat::Tsf, CombineMode::MergeAcrossFiles),
            "{prefix}{type}{id}{suffix}.tsf"
        );
        assert_eq!(
            FilenameTemplate::default_pattern(OutputFormat::Csv, CombineMode::Separate),
            "{prefix}{short}{id}{suffix}.csv"
        );
        assert_eq!(
            FilenameTemplate::default_pattern(OutputFormat::Dat, CombineMode::CombinedPerElement),
            "{prefix}{short}{id}{suffix}.dat"
        );
    }

    #[test]
    fn test_render_all_placeholders() {
        let template =
            FilenameTemplate::parse("{prefix}{type}_{id}_{param}-{short}{suffix}.tsf").unwrap();
        assert_eq!(
            template.render(&ctx()).unwrap(),
            "run_node_J1_Depth_above_invert-D_v2.tsf"
        );
        assert_eq!(template.placeholders().len(), 6);
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = FilenameTemplate::parse("{prefix}{bogus}.tsf").unwrap_err();
        assert_eq!(
            err,
            FilenameTemplateError::UnknownPlaceholder {
                name: "bogus".to_string(),
                template: "{prefix}{bogus}.tsf".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_templates_rejected() {
        assert!(matches!(
            FilenameTemplate::parse("{id.tsf"),
            Err(FilenameTemplateError::Unterminated { .. })
        ));
        assert!(matches!(
            FilenameTemplate::parse("out/{id}.tsf"),
            Err(FilenameTemplateError::ReservedCharacter { ch: '/', .. })
        ));
        assert!(matches!(
            FilenameTemplate::parse("{id}}.tsf"),
            Err(FilenameTemplateError::ReservedCharacter { ch: '}', .. })
        ));
        assert!(matches!(
            FilenameTemplate::parse("   "),
            Err(FilenameTemplateError::EmptyFilename { .. })
        ));
    }

    #[test]
    fn test_values_are_escaped() {
        let template = FilenameTemplate::parse("{type}{id}.tsf").unwrap();
        let ctx = TemplateContext::new(ElementType::Link, "C:1/up\\stream?");
        let name = template.render(&ctx).unwrap();
        assert_eq!(name, "linkC_1_up_stream_.tsf");
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
    }

    #[test]
    fn test_empty_resolution_rejected() {
        let template = FilenameTemplate::parse("{prefix}{suffix}").unwrap();
        let err = template.render(&TemplateContext::default()).unwrap_err();
        assert!(matches!(err, FilenameTemplateError::EmptyFilename { .. }));

        let template = FilenameTemplate::parse("{id}.csv").unwrap();
        let err = template
            .render(&TemplateContext::new(ElementType::Node, ""))
            .unwrap_err();
        assert!(matches!(err, FilenameTemplateError::EmptyFilename { .. }));
    }

    #[test]
    fn test_for_output_falls_back_to_default() {
        let t = FilenameTemplate::for_output(Some("  "), OutputFormat::Csv, CombineMode::Separate)
            .unwrap();
        assert_eq!(t.as_str(), "{prefix}{short}{id}{suffix}.csv");

        let t = FilenameTemplate::for_output(
            Some("{id}.tsf"),
            OutputFormat::Tsf,
            CombineMode::Separate,
        )
        .unwrap();
        assert_eq!(t.to_string(), "{id}.tsf");
    }
}
