//! Interface de linha de comando do arc-notes baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (audit, audit-videos, purge, verify)
//! e flags globais (--max-retries, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// arc-notes: auditoria e remoção em lote de notas publicadas no Arc XP.
#[derive(Debug, Parser)]
#[command(name = "arc-notes", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Número máximo de retentativas por chamada à API.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lista as notas publicadas por site e ano e grava um CSV por ano.
    Audit {
        /// Site a auditar (pode repetir). Padrão: `WEBSITE_NAMES`.
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Anos a auditar: `2022`, `2018-2024`, `2021-`. Padrão: `YEARS_TO_AUDIT`.
        #[arg(long)]
        years: Option<String>,

        /// Diretório de saída dos relatórios. Padrão: `REPORTS_DIR` ou `reports`.
        #[arg(long)]
        reports_dir: Option<PathBuf>,
    },

    /// Lista os vídeos publicados até a data de corte e grava um único CSV.
    AuditVideos {
        /// Site a auditar (pode repetir). Padrão: `WEBSITE_NAMES`.
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Data de corte (RFC 3339). Padrão: `DELETE_CUTOFF_DATE`.
        #[arg(long)]
        cutoff: Option<String>,

        /// Arquivo de saída. Padrão: `todos_los_videos_para_eliminar.csv` em `REPORTS_DIR`.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Tira de circulação, despublica e (opcionalmente) apaga as notas listadas.
    Purge(PurgeArgs),

    /// Confere por amostragem se os ids de um relatório existem na busca.
    Verify {
        /// Relatório CSV gerado pelo audit.
        #[arg(long)]
        csv: PathBuf,

        /// Site onde buscar os ids.
        #[arg(long)]
        site: String,

        /// Quantos ids do início do arquivo conferir.
        #[arg(long, default_value_t = 5)]
        sample: usize,
    },
}

/// Argumentos do subcomando `purge`.
#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Relatório CSV com as notas a processar.
    #[arg(long, conflicts_with_all = ["csv_dir", "ids_file"])]
    pub csv: Option<PathBuf>,

    /// Diretório com relatórios CSV, lidos em ordem de nome.
    #[arg(long, conflicts_with = "ids_file")]
    pub csv_dir: Option<PathBuf>,

    /// Arquivo texto com um id por linha.
    #[arg(long)]
    pub ids_file: Option<PathBuf>,

    /// Máximo de notas a iniciar; 0 significa sem limite.
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Também apaga as notas depois de despublicar.
    #[arg(long, default_value_t = false)]
    pub delete: bool,

    /// Notas processadas em paralelo. Padrão: valor do arquivo de configuração.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// CSV de saída com um registro por passo executado.
    #[arg(long, default_value = "purge_outcomes.csv")]
    pub output: PathBuf,

    /// Grava também o resumo completo da execução em JSON.
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_audit_subcommand() {
        let cli = Cli::parse_from([
            "arc-notes", "audit", "--site", "a", "--site", "b", "--years", "2021-",
        ]);
        match cli.command {
            Command::Audit {
                sites,
                years,
                reports_dir,
            } => {
                assert_eq!(sites, vec!["a", "b"]);
                assert_eq!(years.as_deref(), Some("2021-"));
                assert!(reports_dir.is_none());
            }
            _ => panic!("expected Audit command"),
        }
    }

    #[test]
    fn cli_parses_audit_videos_subcommand() {
        let cli = Cli::parse_from([
            "arc-notes",
            "audit-videos",
            "--site",
            "a",
            "--cutoff",
            "2023-12-31T23:59:59Z",
        ]);
        match cli.command {
            Command::AuditVideos {
                sites,
                cutoff,
                output,
            } => {
                assert_eq!(sites, vec!["a"]);
                assert_eq!(cutoff.as_deref(), Some("2023-12-31T23:59:59Z"));
                assert!(output.is_none());
            }
            _ => panic!("expected AuditVideos command"),
        }
    }

    #[test]
    fn cli_parses_purge_defaults() {
        let cli = Cli::parse_from(["arc-notes", "purge", "--csv", "notas.csv"]);
        match cli.command {
            Command::Purge(args) => {
                assert_eq!(args.csv, Some(PathBuf::from("notas.csv")));
                assert_eq!(args.limit, 0);
                assert!(!args.delete);
                assert!(args.concurrency.is_none());
                assert_eq!(args.output, PathBuf::from("purge_outcomes.csv"));
                assert!(args.summary_json.is_none());
            }
            _ => panic!("expected Purge command"),
        }
    }

    #[test]
    fn cli_rejects_two_inputs() {
        let result = Cli::try_parse_from([
            "arc-notes", "purge", "--csv", "a.csv", "--ids-file", "ids.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "arc-notes",
            "purge",
            "--ids-file",
            "ids.txt",
            "--delete",
            "--limit",
            "10",
            "--max-retries",
            "5",
            "--verbose",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.max_retries, Some(5));
        match cli.command {
            Command::Purge(args) => {
                assert!(args.delete);
                assert_eq!(args.limit, 10);
            }
            _ => panic!("expected Purge command"),
        }
    }

    #[test]
    fn cli_parses_verify_subcommand() {
        let cli = Cli::parse_from(["arc-notes", "verify", "--csv", "r.csv", "--site", "s"]);
        match cli.command {
            Command::Verify { csv, site, sample } => {
                assert_eq!(csv, PathBuf::from("r.csv"));
                assert_eq!(site, "s");
                assert_eq!(sample, 5);
            }
            _ => panic!("expected Verify command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
