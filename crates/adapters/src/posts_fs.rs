//! Filesystem-based post repository

use async_trait::async_trait;
use crosspost_domain::{
    ContentFormat, ConversionError, ConvertedPost, PostMetadata, PostRepository, SourceError,
};
use pulldown_cmark::{Options, Parser, html};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const REQUIRED_FIELDS: [&str; 3] = ["title", "description", "tags"];

/// Markdown posts stored directly under one directory
pub struct FsPostRepository {
    posts_dir: PathBuf,
}

impl FsPostRepository {
    pub fn new(posts_dir: impl AsRef<Path>) -> Self {
        Self {
            posts_dir: posts_dir.as_ref().to_path_buf(),
        }
    }

    /// Convert `file`, render its body to HTML and write it as
    /// `<stem>.json` under `output_dir`
    pub async fn export_json(
        &self,
        file: &str,
        output_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        let mut post = self.convert(file).await?;
        post.content = render_html(&post.content);
        post.content_format = ContentFormat::Html;
        let stem = Path::new(file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        let target = output_dir.join(format!("{}.json", stem));

        let json = serde_json::to_string_pretty(&post)
            .map_err(|e| ConversionError::new(file, e.to_string()))?;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ConversionError::new(file, e.to_string()))?;
        tokio::fs::write(&target, json)
            .await
            .map_err(|e| ConversionError::new(file, e.to_string()))?;

        tracing::info!(file = %file, output = %target.display(), "Converted post");
        Ok(target)
    }
}

#[derive(Debug, PartialEq)]
enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::List(items) => items.join(", "),
        }
    }

    /// Tags may be a comma-separated string or a list
    fn into_tags(self) -> Vec<String> {
        let items = match self {
            Self::Text(text) => text.split(',').map(str::to_string).collect(),
            Self::List(items) => items,
        };
        items
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Split `---` delimited frontmatter from the body
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    let frontmatter = &rest[..end];
    Some((frontmatter, rest[end + 4..].trim()))
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').trim_matches('\'').to_string()
}

/// Simple YAML-like frontmatter parser: `key: value`, inline `[a, b]`
/// lists and `- item` block lists
fn parse_fields(frontmatter: &str) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    let mut open_list: Option<String> = None;

    for line in frontmatter.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            if let Some(key) = &open_list {
                if let Some(FieldValue::List(items)) = fields.get_mut(key) {
                    items.push(unquote(item));
                }
            }
            continue;
        }
        open_list = None;

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim().to_string();
        let value = value.trim();

        if value.is_empty() {
            fields.insert(key.clone(), FieldValue::List(vec![]));
            open_list = Some(key);
        } else if value.starts_with('[') && value.ends_with(']') {
            let items = value[1..value.len() - 1]
                .split(',')
                .map(unquote)
                .filter(|s| !s.is_empty())
                .collect();
            fields.insert(key, FieldValue::List(items));
        } else {
            fields.insert(key, FieldValue::Text(unquote(value)));
        }
    }

    fields
}

fn build_post(file: &str, content: &str) -> Result<ConvertedPost, ConversionError> {
    let (frontmatter, body) = split_frontmatter(content)
        .ok_or_else(|| ConversionError::new(file, "Missing frontmatter"))?;
    let mut fields = parse_fields(frontmatter);

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|name| !fields.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(ConversionError::new(
            file,
            format!("Missing required frontmatter fields: {}", missing.join(", ")),
        ));
    }

    let title = fields.remove("title").map(FieldValue::into_text).unwrap_or_default();
    let description = fields
        .remove("description")
        .map(FieldValue::into_text)
        .unwrap_or_default();
    let tags = fields.remove("tags").map(FieldValue::into_tags).unwrap_or_default();
    let canonical_url = fields
        .remove("canonical_url")
        .or_else(|| fields.remove("canonical"))
        .map(FieldValue::into_text);

    if title.is_empty() {
        return Err(ConversionError::new(file, "Title must not be empty"));
    }

    let extra = fields
        .into_iter()
        .map(|(key, value)| (key, value.into_text()))
        .collect();

    Ok(ConvertedPost {
        metadata: PostMetadata {
            title,
            description,
            tags,
            canonical_url,
            extra,
        },
        content: body.to_string(),
        content_format: ContentFormat::Markdown,
        original_file: file.to_string(),
    })
}

/// CommonMark with tables; fenced code keeps its `language-*` class
fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut rendered = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut rendered, Parser::new_ext(markdown, options));
    rendered
}

#[async_trait]
impl PostRepository for FsPostRepository {
    async fn list_posts(&self) -> Result<BTreeSet<String>, SourceError> {
        if !self.posts_dir.is_dir() {
            return Err(SourceError::NotFound(self.posts_dir.display().to_string()));
        }

        let mut posts = BTreeSet::new();
        let mut entries = tokio::fs::read_dir(&self.posts_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                posts.insert(name.to_string());
            }
        }

        tracing::debug!(dir = %self.posts_dir.display(), count = posts.len(), "Listed posts");
        Ok(posts)
    }

    async fn convert(&self, file: &str) -> Result<ConvertedPost, ConversionError> {
        let path = self.posts_dir.join(file);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConversionError::new(file, e.to_string()))?;
        build_post(file, &content)
    }
}
