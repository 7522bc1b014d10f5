//! Tipos de dados para as requisições e respostas das APIs de conteúdo e de rascunho.
//!
//! As respostas são desserializadas em structs explícitas; qualquer corpo que
//! não encaixe vira [`ApiError::Unexpected`](super::ApiError::Unexpected) no cliente.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Parâmetros de uma consulta ao endpoint `/content/v4/search/published`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Nome do site (parâmetro `website`).
    pub website: String,
    /// Consulta em sintaxe Lucene (parâmetro `q`).
    pub q: String,
    /// Tamanho da página.
    pub size: u32,
    /// Deslocamento da página.
    pub from: u64,
    /// Campos pedidos via `_sourceInclude`.
    pub source_include: Vec<String>,
    /// Ordenação opcional, ex.: `publish_date:asc`.
    pub sort: Option<String>,
}

impl SearchQuery {
    pub fn new(website: impl Into<String>, q: impl Into<String>) -> Self {
        Self {
            website: website.into(),
            q: q.into(),
            size: 100,
            from: 0,
            source_include: Vec::new(),
            sort: None,
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn from_offset(mut self, from: u64) -> Self {
        self.from = from;
        self
    }

    pub fn include(mut self, fields: &[&str]) -> Self {
        self.source_include = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Pares de query string na ordem enviada ao servidor.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("website", self.website.clone()),
            ("q", self.q.clone()),
            ("size", self.size.to_string()),
            ("from", self.from.to_string()),
            ("track_total_hits", "true".to_string()),
        ];
        if !self.source_include.is_empty() {
            params.push(("_sourceInclude", self.source_include.join(",")));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.clone()));
        }
        params
    }
}

/// Uma página de resultados da busca.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Total de documentos que casam com a consulta (não só os desta página).
    #[serde(default)]
    pub count: u64,
    /// Documentos desta página.
    #[serde(default)]
    pub content_elements: Vec<Story>,
}

/// Um documento ANS retornado pela busca, restrito aos campos que o pipeline usa.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Story {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_websites")]
    pub websites: BTreeMap<String, WebsiteEntry>,
    #[serde(default)]
    pub headlines: Option<Headlines>,
}

/// `websites` chega às vezes como `null`, ou com entradas `null` por site.
/// Qualquer coisa que não seja um objeto vira mapa vazio; entradas inválidas são ignoradas.
fn lenient_websites<'de, D>(deserializer: D) -> Result<BTreeMap<String, WebsiteEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let serde_json::Value::Object(map) = serde_json::Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(site, entry)| {
            serde_json::from_value::<WebsiteEntry>(entry)
                .ok()
                .map(|entry| (site, entry))
        })
        .collect())
}

/// Entrada por site dentro de `websites`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebsiteEntry {
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Headlines {
    #[serde(default)]
    pub basic: Option<String>,
}

impl Story {
    /// URL pública da nota: primeiro campo de nível superior preenchido,
    /// depois qualquer URL por site em `websites`.
    pub fn public_url(&self) -> Option<String> {
        [
            &self.canonical_url,
            &self.website_url,
            &self.display_url,
            &self.url,
        ]
        .into_iter()
        .flatten()
        .find(|u| !u.is_empty())
        .cloned()
        .or_else(|| {
            self.websites
                .values()
                .find_map(|w| w.website_url.clone().or_else(|| w.url.clone()))
        })
    }

    pub fn headline(&self) -> Option<&str> {
        self.headlines.as_ref().and_then(|h| h.basic.as_deref())
    }
}

/// Uma circulação de uma nota em um site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Circulation {
    #[serde(default)]
    pub website_id: Option<String>,
}

/// Uma circulação avulsa; só casa quando `website_id` está presente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleCirculation {
    pub website_id: String,
}

/// Formatos aceitos para a resposta de `GET /story/{id}/circulation`.
///
/// A API já foi vista devolvendo uma lista, um objeto envelope ou um único objeto.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CirculationsResponse {
    List(Vec<Circulation>),
    Wrapped {
        #[serde(alias = "items", alias = "results", alias = "data")]
        circulations: Vec<Circulation>,
    },
    Single(SingleCirculation),
}

impl CirculationsResponse {
    /// IDs dos sites em que a nota circula, ignorando entradas sem `website_id`.
    pub fn website_ids(self) -> Vec<String> {
        match self {
            CirculationsResponse::List(list) | CirculationsResponse::Wrapped { circulations: list } => {
                list.into_iter()
                    .filter_map(|c| c.website_id)
                    .filter(|id| !id.is_empty())
                    .collect()
            }
            CirculationsResponse::Single(single) => vec![single.website_id],
        }
    }
}
