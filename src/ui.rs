//! Interface de terminal do arc-notes: barra de progresso e saída colorida.
//!
//! Usa `indicatif` para a barra/spinner e `console` para cores. O
//! [`RunProgress`] acompanha um purge nota a nota; [`print_summary`] fecha a
//! execução com a contagem por passo e a lista de falhas.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::arc::Story;
use crate::state_machine::{ItemReport, ItemState, RunSummary, Step};

struct Palette {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Palette {
    fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }
}

/// Barra de progresso de um purge.
///
/// Cada nota concluída gera uma linha acima da barra: verde quando chegou ao
/// estado final, vermelha quando falhou.
pub struct RunProgress {
    pb: ProgressBar,
    palette: Palette,
}

impl RunProgress {
    /// Inicia a barra para `total` notas.
    pub fn start(total: u64, delete_enabled: bool) -> Self {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
        pb.set_message(if delete_enabled {
            "unpublish + delete"
        } else {
            "unpublish"
        });
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            palette: Palette::new(),
        }
    }

    /// Registra uma nota concluída.
    pub fn item_done(&self, report: &ItemReport) {
        self.pb.println(item_line(&self.palette, report));
        self.pb.inc(1);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

fn item_line(palette: &Palette, report: &ItemReport) -> String {
    match report.final_state {
        ItemState::Failed { step, reason } => format!(
            "  {} {} failed at {step}: {reason}",
            palette.red.apply_to("✗"),
            report.story_id
        ),
        state => format!(
            "  {} {} {}",
            palette.green.apply_to("✓"),
            report.story_id,
            palette.dim.apply_to(state)
        ),
    }
}

/// Spinner simples para etapas sem total conhecido (audit, verify).
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn start(message: impl Into<String>) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// Encerra o spinner e imprime `message` em verde.
    pub fn success(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", Palette::new().green.apply_to("✓"));
    }

    /// Encerra o spinner e imprime `message` em amarelo.
    pub fn warn(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", Palette::new().yellow.apply_to("!"));
    }
}

/// Linhas da tabela de contagem por passo.
fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let counts = summary.step_counts();
    let mut lines = vec![format!(
        "{:<26} {:>9} {:>9} {:>9} {:>9}",
        "step", "attempted", "succeeded", "skipped", "failed"
    )];
    for step in Step::sequence(summary.delete_enabled) {
        let c = counts.get(step).copied().unwrap_or_default();
        lines.push(format!(
            "{:<26} {:>9} {:>9} {:>9} {:>9}",
            step.to_string(),
            c.attempted,
            c.succeeded,
            c.skipped,
            c.failed
        ));
    }
    lines
}

/// Imprime o resumo final da execução.
pub fn print_summary(summary: &RunSummary) {
    let palette = Palette::new();
    let failed = summary.failures().count();
    let title_style = if failed == 0 && summary.halted.is_none() {
        &palette.green
    } else {
        &palette.red
    };

    println!();
    println!("{}", title_style.apply_to("─── Run Summary ───"));
    println!(
        "{}",
        palette.dim.apply_to(format!(
            "run {} · {} items · {} ms",
            summary.run_id,
            summary.items.len(),
            summary.duration_ms()
        ))
    );
    for line in summary_lines(summary) {
        println!("{line}");
    }

    if failed > 0 {
        println!();
        println!("{}", palette.red.apply_to(format!("Failures ({failed})")));
        for item in summary.failures() {
            println!("{}", item_line(&palette, item));
        }
    }
    if let Some(reason) = &summary.halted {
        println!();
        println!("{} {reason}", palette.red.apply_to("Run halted:"));
    }
}

/// Imprime o resultado de uma consulta do `verify`.
pub fn print_lookup(story_id: &str, story: Option<&Story>) {
    let palette = Palette::new();
    match story {
        Some(story) => println!(
            "  {} {story_id} · {} · {} · {}",
            palette.green.apply_to("✓"),
            story.content_type.as_deref().unwrap_or("-"),
            story.publish_date.as_deref().unwrap_or("-"),
            story.headline().unwrap_or("-")
        ),
        None => println!("  {} {story_id} · not found", palette.yellow.apply_to("?")),
    }
}
