use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use docx_critic::config::{init_default_config, load_effective, Overrides, CONFIG_FILENAME};
use docx_critic::docx::changes::ChangeFilter;
use docx_critic::docx::fixture::FixtureBuilder;
use docx_critic::markup::{apply_markup, generate_markup};
use docx_critic::output::{write_atomic, write_output};
use docx_critic::pipeline::{convert_docx, docx_to_markup};
use docx_critic::progress::ConsoleProgress;
use docx_critic::report::{render, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "docx-critic")]
#[command(about = "Tracked changes and comments from .docx files, as a word diff or CriticMarkup", long_about = None)]
struct Args {
    /// Config file path (default: $DOCX_CRITIC_CONFIG, then docx-critic.toml searched upwards)
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    /// No progress lines on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report tracked changes and comments as a word diff or JSON
    Extract {
        #[arg(value_name = "DOCX")]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Which tracked changes to report
        #[arg(long, value_enum)]
        changes: Option<ChangesArg>,

        /// Skip word/comments.xml
        #[arg(long)]
        no_comments: bool,

        /// Report highlighted text as insertions
        #[arg(long)]
        highlights: bool,

        /// Characters of context per side to start from
        #[arg(long, value_name = "N")]
        min_context: Option<usize>,

        /// Upper bound on context characters per side
        #[arg(long, value_name = "N")]
        max_context: Option<usize>,
    },

    /// Render the document as CriticMarkup text
    Markup {
        #[arg(value_name = "DOCX")]
        input: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Mark highlighted text as insertions
        #[arg(long)]
        highlights: bool,
    },

    /// Accept every change in a CriticMarkup text
    Apply {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// CriticMarkup for the edit from OLD to NEW
    Diff {
        #[arg(value_name = "OLD")]
        old: PathBuf,

        #[arg(value_name = "NEW")]
        new: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Write a small reviewed .docx with tracked changes and comments
    Fixture {
        #[arg(value_name = "DOCX")]
        output: PathBuf,
    },

    /// Write a commented default docx-critic.toml, then exit
    InitConfig {
        /// Directory to write the config to (default: current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Git,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Git => OutputFormat::Git,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ChangesArg {
    All,
    Insertions,
    Deletions,
}

impl From<ChangesArg> for ChangeFilter {
    fn from(v: ChangesArg) -> Self {
        match v {
            ChangesArg::All => ChangeFilter::All,
            ChangesArg::Insertions => ChangeFilter::Insertions,
            ChangesArg::Deletions => ChangeFilter::Deletions,
        }
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read input: {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if let Command::InitConfig { dir, force } = &args.command {
        let dir = dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, *force).context("init default config")?;
        progress.info(format!("Wrote config: {}", cfg_path.display()));
        return Ok(());
    }

    let (cfg, cfg_path) = load_effective(args.config.as_deref())?;
    match &cfg_path {
        Some(p) => progress.info(format!("config: {}", p.display())),
        None => progress.info(format!("no {CONFIG_FILENAME} found; using defaults")),
    }

    match args.command {
        Command::Extract {
            input,
            output,
            format,
            changes,
            no_comments,
            highlights,
            min_context,
            max_context,
        } => {
            let settings = cfg
                .resolve(&Overrides {
                    min_context,
                    max_context,
                    changes: changes.map(ChangeFilter::from),
                    no_comments,
                    highlights,
                    format: format.map(OutputFormat::from),
                })
                .context("resolve settings")?;
            progress.info(format!("reading {}", input.display()));
            let diff = convert_docx(&input, &settings.convert, &progress)?;
            let text = render(
                &diff,
                settings.format,
                &settings.window,
                &settings.newline_placeholder,
            )?;
            write_output(output.as_deref(), &text)?;
        }
        Command::Markup {
            input,
            output,
            highlights,
        } => {
            let settings = cfg
                .resolve(&Overrides {
                    highlights,
                    ..Overrides::default()
                })
                .context("resolve settings")?;
            progress.info(format!("reading {}", input.display()));
            let text = docx_to_markup(&input, &settings.convert.extract.structure, &progress)?;
            write_output(output.as_deref(), &text)?;
        }
        Command::Apply { input, output } => {
            let text = apply_markup(&read_text(&input)?);
            write_output(output.as_deref(), &text)?;
        }
        Command::Diff { old, new, output } => {
            let text = generate_markup(&read_text(&old)?, &read_text(&new)?);
            write_output(output.as_deref(), &text)?;
        }
        Command::Fixture { output } => {
            write_atomic(&output, &FixtureBuilder::sample().to_bytes()?)?;
            progress.info(format!("Wrote fixture: {}", output.display()));
        }
        Command::InitConfig { .. } => {}
    }
    Ok(())
}
