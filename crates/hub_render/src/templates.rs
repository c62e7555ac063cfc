//! Client SDK snippets and endpoint documentation.
//!
//! Both are plain string templates filled from explicit parameter structs.

use crate::describe;
use crate::error::{Error, Result};
use hub_policy::{EndpointDefinition, HttpMethod, PolicyConfig, PolicyType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target language of an SDK snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// TypeScript using `fetch`.
    Typescript,
    /// Python using `requests`.
    Python,
    /// Shell using `curl`.
    Curl,
}

impl Language {
    /// All supported languages.
    pub const ALL: [Self; 3] = [Self::Typescript, Self::Python, Self::Curl];

    /// Lowercase language name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Typescript => "typescript",
            Self::Python => "python",
            Self::Curl => "curl",
        }
    }

    /// File extension for snippets in this language.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Typescript => "ts",
            Self::Python => "py",
            Self::Curl => "sh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Ok(Self::Typescript),
            "python" | "py" => Ok(Self::Python),
            "curl" | "shell" | "sh" => Ok(Self::Curl),
            other => Err(Error::Unsupported {
                kind: "language",
                name: other.to_string(),
            }),
        }
    }
}

/// Parameters for an SDK snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkParams {
    /// Public base URL of the hub.
    pub base_url: String,
    /// Endpoint path.
    pub path: String,
    /// Method the snippet calls.
    pub method: HttpMethod,
    /// Header carrying the API key, if the endpoint requires one.
    pub api_key_header: Option<String>,
    /// Name of the generated client function.
    pub function_name: String,
}

impl SdkParams {
    /// Derives parameters from an endpoint definition.
    ///
    /// Uses the first served method (GET if none) and the header of the first
    /// enabled authentication policy.
    #[must_use]
    pub fn from_endpoint(endpoint: &EndpointDefinition, base_url: impl Into<String>) -> Self {
        let api_key_header = endpoint
            .policies
            .ordered()
            .into_iter()
            .filter(|p| p.enabled)
            .find_map(|p| match &p.config {
                PolicyConfig::Authentication(cfg) => {
                    Some(cfg.header.clone().unwrap_or_else(|| "Authorization".to_string()))
                }
                _ => None,
            });
        let method = endpoint.methods.first().copied().unwrap_or(HttpMethod::Get);
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            path: endpoint.path.clone(),
            method,
            api_key_header,
            function_name: function_name(method, &endpoint.path),
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    fn has_body(&self) -> bool {
        matches!(self.method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

/// Builds a camel-case function name such as `getV1Orders`.
fn function_name(method: HttpMethod, path: &str) -> String {
    let mut name = method.as_str().to_ascii_lowercase();
    for segment in path.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            name.push(first.to_ascii_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

/// Renders a client snippet.
#[must_use]
pub fn render_sdk(params: &SdkParams, language: Language) -> String {
    match language {
        Language::Typescript => render_typescript(params),
        Language::Python => render_python(params),
        Language::Curl => render_curl(params),
    }
}

fn render_typescript(params: &SdkParams) -> String {
    let mut headers = vec!["'Content-Type': 'application/json'".to_string()];
    if let Some(header) = &params.api_key_header {
        headers.push(format!("'{header}': apiKey"));
    }
    let (signature, body) = if params.has_body() {
        ("apiKey: string, payload: unknown", "\n    body: JSON.stringify(payload),")
    } else {
        ("apiKey: string", "")
    };

    format!(
        "export async function {name}({signature}): Promise<unknown> {{\n  \
         const response = await fetch('{url}', {{\n    \
         method: '{method}',\n    \
         headers: {{ {headers} }},{body}\n  \
         }});\n  \
         if (!response.ok) {{\n    \
         throw new Error(`{method} {path} failed: ${{response.status}}`);\n  \
         }}\n  \
         return response.json();\n\
         }}\n",
        name = params.function_name,
        url = params.url(),
        method = params.method,
        path = params.path,
        headers = headers.join(", "),
    )
}

fn render_python(params: &SdkParams) -> String {
    let name = to_snake_case(&params.function_name);
    let mut headers = vec!["\"Content-Type\": \"application/json\"".to_string()];
    if let Some(header) = &params.api_key_header {
        headers.push(format!("\"{header}\": api_key"));
    }
    let (signature, body) = if params.has_body() {
        ("api_key: str, payload: dict", ", json=payload")
    } else {
        ("api_key: str", "")
    };

    format!(
        "import requests\n\n\n\
         def {name}({signature}) -> dict:\n    \
         response = requests.request(\n        \
         \"{method}\",\n        \
         \"{url}\",\n        \
         headers={{{headers}}}{body},\n        \
         timeout=30,\n    \
         )\n    \
         response.raise_for_status()\n    \
         return response.json()\n",
        method = params.method,
        url = params.url(),
        headers = headers.join(", "),
    )
}

fn render_curl(params: &SdkParams) -> String {
    let mut lines = vec![format!("curl -X {} '{}'", params.method, params.url())];
    lines.push("  -H 'Content-Type: application/json'".to_string());
    if let Some(header) = &params.api_key_header {
        lines.push(format!("  -H '{header}: $HUB_API_KEY'"));
    }
    if params.has_body() {
        lines.push("  -d @payload.json".to_string());
    }
    let mut out = lines.join(" \\\n");
    out.push('\n');
    out
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// One policy row in endpoint documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocPolicy {
    /// Policy name.
    pub name: String,
    /// Policy type.
    pub policy_type: PolicyType,
    /// One-line summary.
    pub summary: String,
}

/// Parameters for endpoint documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocParams {
    /// Page title.
    pub title: String,
    /// Endpoint path.
    pub path: String,
    /// Served methods.
    pub methods: Vec<HttpMethod>,
    /// Enabled policies in execution order.
    pub policies: Vec<DocPolicy>,
    /// Snippets to embed.
    pub examples: Vec<(Language, String)>,
}

impl DocParams {
    /// Derives parameters from an endpoint, embedding a snippet per language.
    #[must_use]
    pub fn from_endpoint(endpoint: &EndpointDefinition, base_url: &str) -> Self {
        let sdk = SdkParams::from_endpoint(endpoint, base_url);
        Self {
            title: format!("{} API", endpoint.path),
            path: endpoint.path.clone(),
            methods: endpoint.methods.clone(),
            policies: endpoint
                .policies
                .ordered()
                .into_iter()
                .filter(|p| p.enabled)
                .map(|p| DocPolicy {
                    name: p.name.clone(),
                    policy_type: p.kind(),
                    summary: describe::config(&p.config),
                })
                .collect(),
            examples: Language::ALL
                .into_iter()
                .map(|language| (language, render_sdk(&sdk, language)))
                .collect(),
        }
    }
}

/// Renders endpoint documentation as markdown.
#[must_use]
pub fn render_docs(params: &DocParams) -> String {
    let mut doc = format!("# {}\n\n", params.title);

    let methods = if params.methods.is_empty() {
        "GET".to_string()
    } else {
        params
            .methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    doc.push_str(&format!("`{}` accepts {}.\n\n", params.path, methods));

    doc.push_str("## Policies\n\n");
    if params.policies.is_empty() {
        doc.push_str("No policies apply.\n\n");
    } else {
        doc.push_str("| # | Policy | Type | Behaviour |\n|---|---|---|---|\n");
        for (i, policy) in params.policies.iter().enumerate() {
            doc.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                i + 1,
                policy.name.replace('|', "\\|"),
                policy.policy_type,
                policy.summary.replace('|', "\\|")
            ));
        }
        doc.push('\n');
    }

    if !params.examples.is_empty() {
        doc.push_str("## Examples\n\n");
        for (language, snippet) in &params.examples {
            let fence = match language {
                Language::Typescript => "typescript",
                Language::Python => "python",
                Language::Curl => "bash",
            };
            doc.push_str(&format!("```{fence}\n{snippet}```\n\n"));
        }
    }

    doc
}
