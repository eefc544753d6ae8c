//! Field declarations and query compilation
//!
//! A [`FieldSpec`] is what a type declares for one translatable field. At
//! registration it is compiled into the final SQL text and cache-key prefix.

use crate::error::DeclarationError;
use translator_common::config::DICT_CODE_PLACEHOLDER;

/// Dictionary templates taken from configuration
#[derive(Debug, Clone)]
pub struct DictTemplates {
    pub default: String,
    pub english: String,
}

impl From<&translator_common::TranslatorConfig> for DictTemplates {
    fn from(config: &translator_common::TranslatorConfig) -> Self {
        Self {
            default: config.dict_query_sql.clone(),
            english: config.dict_query_sql_eng.clone(),
        }
    }
}

/// Declaration of one translatable field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSpec {
    pub(crate) associations: Vec<String>,
    pub(crate) dict_code: Option<String>,
    pub(crate) sql: Option<String>,
    pub(crate) template_params: Vec<String>,
    pub(crate) cache_key_prefix: Option<String>,
}

impl FieldSpec {
    /// Translate from the given association fields, in query-parameter order
    pub fn associated<I, S>(associations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            associations: associations.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Resolve through the dictionary templates
    #[must_use]
    pub fn dict_code(mut self, code: impl Into<String>) -> Self {
        self.dict_code = Some(code.into());
        self
    }

    /// Resolve through a literal query with one positional `?` per
    /// association field. Named parameters (`:code`, `@code`, `$code`) are
    /// not bound; a query using them is rejected at registration.
    #[must_use]
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Static values substituted for `{0}`, `{1}`, ... in the literal query
    #[must_use]
    pub fn template_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.template_params = params.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn associations(&self) -> &[String] {
        &self.associations
    }
}

/// Final query text and cache-key prefix of a translatable field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub sql: String,
    pub prefix: String,
}

impl CompiledQuery {
    /// Number of association values the query binds
    #[must_use]
    pub fn arity(&self) -> usize {
        count_placeholders(&self.sql)
    }
}

/// Compile `spec` for the target field `target`
pub fn compile(
    target: &str,
    spec: &FieldSpec,
    templates: &DictTemplates,
) -> Result<CompiledQuery, DeclarationError> {
    if spec.associations.is_empty() {
        return Err(DeclarationError::NoAssociations {
            field: target.to_string(),
        });
    }

    let query = if let Some(code) = non_blank(spec.dict_code.as_deref()) {
        let (template, derived_prefix) = if is_english_target(target) {
            (&templates.english, format!("dict:eng:{code}:"))
        } else {
            (&templates.default, format!("dict:{code}:"))
        };
        CompiledQuery {
            sql: template.replace(DICT_CODE_PLACEHOLDER, code),
            prefix: non_blank(spec.cache_key_prefix.as_deref())
                .map_or(derived_prefix, str::to_string),
        }
    } else if let Some(sql) = non_blank(spec.sql.as_deref()) {
        CompiledQuery {
            sql: format_indexed(sql, &spec.template_params),
            prefix: spec.cache_key_prefix.clone().unwrap_or_default(),
        }
    } else {
        return Err(DeclarationError::NoQuery {
            field: target.to_string(),
        });
    };

    let placeholders = query.arity();
    if placeholders != spec.associations.len() {
        return Err(DeclarationError::ParameterCount {
            field: target.to_string(),
            placeholders,
            associations: spec.associations.len(),
        });
    }
    Ok(query)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Naming convention selecting the English dictionary template: the field
/// name ends in "enName" or "engName", ignoring case and underscores.
#[must_use]
pub fn is_english_target(field: &str) -> bool {
    let normalized: String = field
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    normalized.ends_with("enname") || normalized.ends_with("engname")
}

/// Count positional `?` placeholders outside quoted literals and identifiers
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '?' => count += 1,
            None => {}
        }
    }
    count
}

/// Substitute `{0}`, `{1}`, ... with `params`; unknown indexes stay as written
#[must_use]
pub fn format_indexed(template: &str, params: &[String]) -> String {
    if params.is_empty() {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let substituted = tail.find('}').and_then(|close| {
            let index: usize = tail[1..close].parse().ok()?;
            params.get(index).map(|value| (value, close))
        });
        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
