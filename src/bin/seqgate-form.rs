// SPDX-License-Identifier: Apache-2.0
//! Prints the signup form for a sequence config, for pasting into a page
//! that is not served by seqgate.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use seqgate::config::AppConfig;
use seqgate::render::{render_embed, render_form, render_page, FormTarget, ScriptSource};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    /// Post straight to the webhook; the API key is written into the page
    Direct,
    /// Post JSON to a seqgate `/submit-form` route
    Rest,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Output {
    /// Full HTML document
    Page,
    /// Form, settings and inline script
    Embed,
    /// Bare form markup
    Form,
}

#[derive(Debug, Parser)]
#[command(name = "seqgate-form", about = "Generate the email sequence signup form")]
struct Cli {
    /// Sequence config file
    #[arg(short, long, env = "SEQGATE_CONFIG", default_value = "config/sequence.toml")]
    config: PathBuf,

    /// Overrides sequence.api_key for the direct target
    #[arg(long, env = "SEQGATE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(short, long, value_enum, default_value_t = Target::Rest)]
    target: Target,

    /// Submission URL for the rest target
    #[arg(long, default_value = "/submit-form")]
    submit_url: String,

    #[arg(short, long, value_enum, default_value_t = Output::Embed)]
    output: Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::from_file(&cli.config) {
        Ok(config) => config.sequence,
        Err(e) => {
            eprintln!("seqgate-form: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(key) = cli.api_key {
        config.set_api_key(key);
    }

    let target = match cli.target {
        Target::Direct => {
            if config.api_key().is_none() {
                eprintln!("seqgate-form: direct target needs an API key (--api-key or sequence.api_key)");
                return ExitCode::FAILURE;
            }
            FormTarget::Direct
        }
        Target::Rest => FormTarget::Rest { url: cli.submit_url },
    };

    let rendered = match cli.output {
        Output::Page => render_page(&config, &target, &ScriptSource::Inline),
        Output::Embed => render_embed(&config, &target, &ScriptSource::Inline),
        Output::Form => Ok(render_form(&config)),
    };

    match rendered {
        Ok(html) => {
            print!("{}", html);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("seqgate-form: failed to render form: {}", e);
            ExitCode::FAILURE
        }
    }
}
