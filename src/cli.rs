//! Interface de linha de comando do legenda baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, scan, models,
//! init) e flags globais (--model, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// legenda — Legendador de imagens em lote com failover de chaves e modelos.
#[derive(Debug, Parser)]
#[command(name = "legenda", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Modelo inicial do catálogo a usar nesta execução.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Legenda todas as imagens elegíveis da pasta.
    Run {
        /// Pasta com as imagens (padrão: a configurada em legenda.toml).
        folder: Option<PathBuf>,
    },

    /// Lista o que seria legendado, sem chamar a API.
    Scan {
        /// Pasta com as imagens (padrão: a configurada em legenda.toml).
        folder: Option<PathBuf>,
    },

    /// Mostra o catálogo de modelos na ordem de fallback.
    Models,

    /// Escreve um legenda.toml inicial no diretório atual.
    Init {
        /// Sobrescreve um legenda.toml existente.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}
