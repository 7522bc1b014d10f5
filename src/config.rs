//! Configuração do arc-notes carregada a partir de `arc-notes.toml`.
//!
//! A struct [`AppConfig`] contém todos os parâmetros ajustáveis do pipeline.
//! Valores ausentes no arquivo usam defaults sensíveis. As variáveis
//! `WEBSITE_NAMES`, `YEARS_TO_AUDIT`, `REPORTS_DIR` e `DELETE_CUTOFF_DATE` têm precedência sobre o
//! arquivo; flags da CLI têm precedência sobre ambos (aplicadas em `main`).
//!
//! As credenciais ficam fora do arquivo: [`Credentials::from_env`] lê
//! `ARC_ACCESS_TOKEN` e `ORG_ID` do ambiente (ou do `.env`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::AppError;
use crate::throttle::RetryPolicy;

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "arc-notes.toml";

/// Configuração de nível superior carregada de `arc-notes.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// URL base da API; sem valor, deriva de `ORG_ID`.
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Timeout das chamadas à API de rascunho, em segundos.
    #[serde(default = "default_draft_timeout_secs")]
    pub draft_timeout_secs: u64,

    /// Timeout das chamadas de busca, em segundos.
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,

    /// Máximo de retentativas depois da primeira tentativa.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Teto de qualquer atraso de backoff.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Espaçamento mínimo entre duas chamadas quaisquer; 0 desliga o limitador.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Notas processadas em paralelo durante o purge.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Tamanho de página da busca.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maior `from + size` aceito pela busca.
    #[serde(default = "default_max_result_window")]
    pub max_result_window: u64,

    /// Sites auditados quando `--site` não é informado.
    #[serde(default)]
    pub websites: Vec<String>,

    /// Anos auditados, no formato `2022`, `2018-2024` ou `2021-`.
    #[serde(default)]
    pub years: String,

    /// Diretório onde os relatórios CSV são gravados.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Vídeos publicados depois desta data ficam fora da auditoria de vídeos.
    #[serde(default = "default_delete_cutoff_date")]
    pub delete_cutoff_date: String,
}

fn default_draft_timeout_secs() -> u64 {
    10
}

fn default_search_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

// 50ms: no máximo ~20 chamadas por segundo no processo inteiro.
fn default_min_request_interval_ms() -> u64 {
    50
}

fn default_concurrency() -> usize {
    1
}

fn default_page_size() -> u32 {
    100
}

fn default_max_result_window() -> u64 {
    10_000
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_delete_cutoff_date() -> String {
    "2024-12-31T23:59:59Z".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            draft_timeout_secs: default_draft_timeout_secs(),
            search_timeout_secs: default_search_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            concurrency: default_concurrency(),
            page_size: default_page_size(),
            max_result_window: default_max_result_window(),
            websites: Vec::new(),
            years: String::new(),
            reports_dir: default_reports_dir(),
            delete_cutoff_date: default_delete_cutoff_date(),
        }
    }
}

impl AppConfig {
    /// Carrega a configuração de `arc-notes.toml` no diretório atual e aplica o ambiente.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, AppError> {
        let mut config = Self::from_file(Path::new(CONFIG_FILE))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Lê um arquivo específico; arquivo ausente equivale a defaults.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&contents)?)
    }

    /// Sobrescreve campos com as variáveis de ambiente não vazias.
    ///
    /// `lookup` abstrai `std::env::var` para que os testes não mexam no
    /// ambiente do processo.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(sites) = var("WEBSITE_NAMES") {
            self.websites = split_list(&sites);
        }
        if let Some(years) = var("YEARS_TO_AUDIT") {
            self.years = years.trim().to_string();
        }
        if let Some(dir) = var("REPORTS_DIR") {
            self.reports_dir = PathBuf::from(dir.trim());
        }
        if let Some(cutoff) = var("DELETE_CUTOFF_DATE") {
            self.delete_cutoff_date = cutoff.trim().to_string();
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn draft_timeout(&self) -> Duration {
        Duration::from_secs(self.draft_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

/// Lista separada por vírgulas, sem itens vazios.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token e organização usados para falar com a plataforma.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: SecretString,
    pub org_id: String,
}

impl Credentials {
    /// Lê `ARC_ACCESS_TOKEN` e `ORG_ID`; falha já na partida se faltar algum.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(AppError::MissingEnv(key))
        };
        Ok(Self {
            access_token: SecretString::from(required("ARC_ACCESS_TOKEN")?),
            org_id: required("ORG_ID")?,
        })
    }
}
