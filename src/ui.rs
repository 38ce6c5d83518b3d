//! Interface de terminal do legenda — spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`RunConsole`] renderiza o fluxo de eventos de
//! uma execução e imprime o relatório final em JSON.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::events::{EventReceiver, RunEvent};
use crate::state_machine::{RunReport, Termination};

/// Renderizador de terminal para uma execução de legendagem.
///
/// O spinner mostra o arquivo em processamento; cada evento vira uma linha
/// colorida: verde para sucesso, vermelho para falha, amarelo para rotação
/// de chave/modelo.
pub struct RunConsole {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Inclui na saída os pulos de imagens já legendadas.
    verbose: bool,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para avisos e rotações.
    yellow: Style,
    // Estilo ciano para o cabeçalho da execução.
    cyan: Style,
}

impl RunConsole {
    /// Inicia o spinner e retorna o renderizador.
    pub fn start(verbose: bool) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            verbose,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            cyan: Style::new().cyan(),
        }
    }

    /// Consome o canal de eventos até o emissor encerrar.
    pub async fn render(&self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle(&event);
        }
        self.pb.finish_and_clear();
    }

    fn handle(&self, event: &RunEvent) {
        match event {
            RunEvent::Started { .. } => {
                self.pb.println(format!("{}", self.cyan.apply_to(event)));
            }
            RunEvent::Attempting { file } => {
                self.pb.set_message(file.clone());
            }
            RunEvent::AlreadyCaptioned { .. } => {
                if self.verbose {
                    self.pb
                        .println(format!("  {} {event}", self.yellow.apply_to("-")));
                }
            }
            RunEvent::Completed { .. } => {
                self.pb
                    .println(format!("  {} {event}", self.green.apply_to("✓")));
            }
            RunEvent::Skipped { .. } => {
                self.pb
                    .println(format!("  {} {event}", self.red.apply_to("✗")));
            }
            RunEvent::QuotaHit { .. }
            | RunEvent::SwitchedKey { .. }
            | RunEvent::SwitchedModel { .. } => {
                self.pb
                    .println(format!("  {} {event}", self.yellow.apply_to("↻")));
            }
            RunEvent::NothingToDo => {
                self.pb
                    .println(format!("  {} {event}", self.yellow.apply_to("-")));
            }
            RunEvent::MatrixExhausted { .. } => {
                self.pb
                    .println(format!("{} {event}", self.red.apply_to("✗")));
            }
            RunEvent::Stopped { .. } => {
                self.pb
                    .println(format!("{} {event}", self.yellow.apply_to("!")));
            }
            RunEvent::Finished { .. } => {
                self.pb
                    .println(format!("{} {event}", self.green.apply_to("✓")));
            }
        }
    }

    /// Imprime o relatório final formatado em JSON com estilo colorido.
    pub fn print_report(&self, report: &RunReport) {
        let style = match report.termination {
            Termination::Completed => &self.green,
            Termination::Exhausted => &self.red,
            Termination::Stopped => &self.yellow,
        };
        println!();
        println!("{}", style.apply_to("─── Run Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}
