use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atelier_contracts::chat::{parse_command, ChatCommand, StructuredReply, CHAT_HELP_COMMANDS};
use atelier_contracts::config::AtelierConfig;
use atelier_contracts::events::EventWriter;
use atelier_contracts::jobs::JobMode;
use atelier_contracts::prompts::prepend_exclusions;
use atelier_engine::{
    BackendClient, Canvas, DialogueController, DryrunBackend, GenerationResult, OpenAiChat, Studio,
    WebUiBackend,
};
use clap::{Args, Parser, Subcommand};
use image::{DynamicImage, ImageFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_WRITTEN: i32 = 0;
const EXIT_NOTHING_PRODUCED: i32 = 2;

const SKETCH_NEGATIVE: &str = "low quality, bad anatomy, worst quality, text, watermark";
const INPAINT_NEGATIVE: &str = "low quality, bad anatomy";
const NO_PROMPT_YET: &str = "No prompt yet. Ask for a picture first.";

#[derive(Debug, Parser)]
#[command(
    name = "atelier",
    version,
    about = "Chat for Danbooru-style prompts, then turn sketches into pictures"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Stable Diffusion WebUI base URL (overrides ATELIER_WEBUI_URL)
    #[arg(long, global = true)]
    webui_url: Option<String>,
    /// Generate solid placeholder images instead of calling the WebUI
    #[arg(long, global = true)]
    dryrun: bool,
    /// Append journal events to this jsonl file
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive prompt assistant
    Chat(ChatArgs),
    /// Sketch-guided generation (ControlNet on the line art)
    Sketch(SketchArgs),
    /// Repaint the masked region of an image
    Inpaint(InpaintArgs),
}

#[derive(Debug, Parser)]
struct ChatArgs {
    /// Directory for images generated with /sketch and /inpaint
    #[arg(long, default_value = ".")]
    out: PathBuf,
    /// Chat model (overrides ATELIER_CHAT_MODEL)
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct PromptArgs {
    #[arg(long)]
    prompt: String,
    /// Tags to keep out of the picture; placed at the front of the negative prompt
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
}

impl PromptArgs {
    fn negative_with_exclusions(&self, negative: &str) -> String {
        prepend_exclusions(&self.exclude, negative)
    }
}

#[derive(Debug, Parser)]
struct SketchArgs {
    /// Line art; an empty or fully transparent file means the layers are the line art
    #[arg(long)]
    background: PathBuf,
    /// Color layers composited over the background, bottom first
    #[arg(long)]
    layer: Vec<PathBuf>,
    #[command(flatten)]
    prompts: PromptArgs,
    #[arg(long, default_value = SKETCH_NEGATIVE)]
    negative: String,
    #[arg(long)]
    out: PathBuf,
    /// Also write the edge map the job was conditioned on
    #[arg(long)]
    debug_out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct InpaintArgs {
    #[arg(long)]
    background: PathBuf,
    /// Mask layer first (alpha or white marks the area to repaint)
    #[arg(long, required = true)]
    layer: Vec<PathBuf>,
    #[command(flatten)]
    prompts: PromptArgs,
    #[arg(long, default_value = INPAINT_NEGATIVE)]
    negative: String,
    #[arg(long)]
    out: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("atelier error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(err) => tracing::debug!(error = %err, "no .env loaded"),
    }

    let mut config = AtelierConfig::from_env();
    if let Some(url) = cli.global.webui_url.as_deref() {
        config.backend = config.backend.with_webui_url(url);
    }
    let events = match cli.global.events.as_ref() {
        Some(path) => EventWriter::for_new_session(path),
        None => EventWriter::disabled(),
    };

    match cli.command {
        Command::Chat(args) => {
            if let Some(model) = args.model.as_deref() {
                config.chat.model = model.to_string();
            }
            let studio = build_studio(&cli.global, &config, events.clone())?;
            run_chat(args, &config, studio, events)?;
            Ok(EXIT_WRITTEN)
        }
        Command::Sketch(args) => {
            let studio = build_studio(&cli.global, &config, events)?;
            run_sketch(args, &studio)
        }
        Command::Inpaint(args) => {
            let studio = build_studio(&cli.global, &config, events)?;
            run_inpaint(args, &studio)
        }
    }
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("atelier={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn build_studio(global: &GlobalArgs, config: &AtelierConfig, events: EventWriter) -> Result<Studio> {
    let backend = if global.dryrun {
        BackendClient::new(DryrunBackend)
    } else {
        BackendClient::new(WebUiBackend::new(&config.backend)?)
    };
    tracing::debug!(
        backend = backend.name(),
        webui_url = %config.backend.webui_url,
        "generation backend ready"
    );
    Ok(Studio::new(backend, config.jobs.clone(), events))
}

fn run_sketch(args: SketchArgs, studio: &Studio) -> Result<i32> {
    let canvas = Canvas::from_paths(&args.background, &args.layer)?;
    let negative = args.prompts.negative_with_exclusions(&args.negative);
    let result = studio.generate_sketch(Some(&canvas), &args.prompts.prompt, &negative);
    write_result(&result, &args.out, args.debug_out.as_deref())
}

fn run_inpaint(args: InpaintArgs, studio: &Studio) -> Result<i32> {
    let canvas = Canvas::from_paths(&args.background, &args.layer)?;
    let negative = args.prompts.negative_with_exclusions(&args.negative);
    let result = studio.generate_inpaint(Some(&canvas), &args.prompts.prompt, &negative);
    write_result(&result, &args.out, None)
}

fn write_result(result: &GenerationResult, out: &Path, debug_out: Option<&Path>) -> Result<i32> {
    let Some(image) = result.image.as_ref() else {
        eprintln!("No image was produced.");
        return Ok(EXIT_NOTHING_PRODUCED);
    };
    save_png(image, out)?;
    println!("Image written to {}", out.display());
    if let (Some(path), Some(debug)) = (debug_out, result.debug.as_ref()) {
        save_png(debug, path)?;
        println!("Edge map written to {}", path.display());
    }
    Ok(EXIT_WRITTEN)
}

fn save_png(image: &DynamicImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to save {}", path.display()))
}

/// Prompts lifted from the most recent structured reply.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct LastPrompts {
    positive: Option<String>,
    negative: Option<String>,
}

impl LastPrompts {
    /// Keeps the reply's prompts when it carried any; casual replies leave the previous ones.
    fn remember(&mut self, reply: &StructuredReply) -> bool {
        if !reply.has_prompts() {
            return false;
        }
        self.positive = reply.positive.clone();
        self.negative = reply.negative.clone();
        true
    }

    fn positive(&self) -> Option<&str> {
        self.positive.as_deref()
    }

    fn negative(&self) -> &str {
        self.negative.as_deref().unwrap_or_default()
    }
}

fn run_chat(
    args: ChatArgs,
    config: &AtelierConfig,
    studio: Studio,
    events: EventWriter,
) -> Result<()> {
    let chat = OpenAiChat::new(&config.chat)?;
    if config.chat.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; chat replies will be errors");
    }
    let mut dialogue = DialogueController::new(chat, events);
    let mut prompts = LastPrompts::default();
    let mut generated = 0usize;

    let stdin = io::stdin();
    let mut line = String::new();
    println!("Atelier chat started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_command(line.trim_end_matches(['\n', '\r'])) {
            ChatCommand::Noop => {}
            ChatCommand::Help => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            ChatCommand::Reset => {
                dialogue.reset();
                prompts = LastPrompts::default();
                println!("Conversation cleared.");
            }
            ChatCommand::ShowPrompt => match prompts.positive() {
                Some(positive) => {
                    println!("Positive Prompt: {positive}");
                    println!("Negative Prompt: {}", prompts.negative());
                }
                None => println!("{NO_PROMPT_YET}"),
            },
            ChatCommand::Quit => break,
            ChatCommand::Message(message) => {
                let reply = dialogue.turn(&message);
                println!("{reply}");
                if prompts.remember(&StructuredReply::parse(&reply)) {
                    println!("(prompt saved; use /sketch or /inpaint to draw it)");
                }
            }
            ChatCommand::Sketch { paths } | ChatCommand::Inpaint { paths } if paths.is_empty() => {
                println!("Usage: /sketch BACKGROUND [LAYER...] or /inpaint BACKGROUND MASK [LAYER...]");
            }
            ChatCommand::Sketch { paths } => {
                chat_generate(JobMode::Sketch, &paths, &studio, &prompts, &args.out, &mut generated)?;
            }
            ChatCommand::Inpaint { paths } => {
                chat_generate(JobMode::Inpaint, &paths, &studio, &prompts, &args.out, &mut generated)?;
            }
            ChatCommand::Unknown { command, .. } => {
                println!("Unknown command: /{command}. Type /help for commands.");
            }
        }
    }
    Ok(())
}

fn canvas_from_args(paths: &[String]) -> Option<Canvas> {
    let (background, layers) = paths.split_first()?;
    let layers: Vec<PathBuf> = layers.iter().map(PathBuf::from).collect();
    match Canvas::from_paths(Path::new(background), &layers) {
        Ok(canvas) => Some(canvas),
        Err(err) => {
            println!("Could not load canvas: {err:#}");
            None
        }
    }
}

fn chat_generate(
    mode: JobMode,
    paths: &[String],
    studio: &Studio,
    prompts: &LastPrompts,
    out_dir: &Path,
    generated: &mut usize,
) -> Result<()> {
    let Some(positive) = prompts.positive() else {
        println!("{NO_PROMPT_YET}");
        return Ok(());
    };
    let Some(canvas) = canvas_from_args(paths) else {
        return Ok(());
    };
    if let Some(reason) = missing_chat_input(mode, &canvas) {
        println!("{reason}");
        return Ok(());
    }
    let result = match mode {
        JobMode::Sketch => studio.generate_sketch(Some(&canvas), positive, prompts.negative()),
        JobMode::Inpaint => studio.generate_inpaint(Some(&canvas), positive, prompts.negative()),
    };
    match save_chat_result(&result, out_dir, mode, generated)? {
        Some(path) => println!("Image written to {}", path.display()),
        None => println!("No image was produced. Check that the WebUI is running."),
    }
    Ok(())
}

/// Tells the user what is missing before anything is sent to the backend.
fn missing_chat_input(mode: JobMode, canvas: &Canvas) -> Option<&'static str> {
    match mode {
        JobMode::Sketch if canvas.composite().is_none() => {
            Some("The canvas is empty; there is nothing to sketch from.")
        }
        JobMode::Inpaint if canvas.layers().is_empty() => {
            Some("Inpaint needs a mask layer: /inpaint BACKGROUND MASK [LAYER...]")
        }
        _ => None,
    }
}

/// Saves a produced image under the next free number. Absent results keep the numbering as is.
fn save_chat_result(
    result: &GenerationResult,
    out_dir: &Path,
    mode: JobMode,
    generated: &mut usize,
) -> Result<Option<PathBuf>> {
    let Some(image) = result.image.as_ref() else {
        return Ok(None);
    };
    *generated += 1;
    let path = numbered_output(out_dir, mode.as_str(), *generated, "");
    save_png(image, &path)?;
    if let Some(debug) = result.debug.as_ref() {
        let edges_path = numbered_output(out_dir, mode.as_str(), *generated, "-edges");
        save_png(debug, &edges_path)?;
        println!("Edge map written to {}", edges_path.display());
    }
    Ok(Some(path))
}

fn numbered_output(out_dir: &Path, mode: &str, index: usize, suffix: &str) -> PathBuf {
    out_dir.join(format!("atelier-{mode}-{index:03}{suffix}.png"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use atelier_contracts::chat::StructuredReply;
    use clap::Parser;
    use image::{DynamicImage, Rgb, RgbImage};

    use atelier_contracts::jobs::JobMode;
    use atelier_engine::{Canvas, GenerationResult};

    use super::{
        missing_chat_input, numbered_output, save_chat_result, save_png, write_result, Cli,
        Command, LastPrompts,
    };
    use super::{EXIT_NOTHING_PRODUCED, EXIT_WRITTEN, INPAINT_NEGATIVE, SKETCH_NEGATIVE};

    #[test]
    fn sketch_flags_parse_with_global_options() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "atelier",
            "sketch",
            "--dryrun",
            "--background",
            "bg.png",
            "--layer",
            "a.png",
            "--layer",
            "b.png",
            "--prompt",
            "1girl, armor",
            "--exclude",
            "helmet,beard",
            "--out",
            "out.png",
        ])?;
        assert!(cli.global.dryrun);
        let Command::Sketch(args) = cli.command else {
            anyhow::bail!("expected sketch");
        };
        assert_eq!(args.layer.len(), 2);
        assert_eq!(args.negative, SKETCH_NEGATIVE);
        assert_eq!(
            args.prompts.negative_with_exclusions(&args.negative),
            "helmet, beard, low quality, bad anatomy, worst quality, text, watermark"
        );
        Ok(())
    }

    #[test]
    fn negative_defaults_differ_per_mode_and_can_be_cleared() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "atelier", "inpaint", "--background", "bg.png", "--layer", "mask.png", "--prompt",
            "red eyes", "--out", "out.png",
        ])?;
        let Command::Inpaint(args) = cli.command else {
            anyhow::bail!("expected inpaint");
        };
        assert_eq!(args.negative, INPAINT_NEGATIVE);

        let cli = Cli::try_parse_from([
            "atelier", "sketch", "--background", "bg.png", "--prompt", "1girl", "--negative", "",
            "--exclude", "helmet", "--out", "out.png",
        ])?;
        let Command::Sketch(args) = cli.command else {
            anyhow::bail!("expected sketch");
        };
        assert_eq!(args.prompts.negative_with_exclusions(&args.negative), "helmet");
        Ok(())
    }

    #[test]
    fn inpaint_requires_a_mask_layer() {
        let parsed = Cli::try_parse_from([
            "atelier",
            "inpaint",
            "--background",
            "bg.png",
            "--prompt",
            "red eyes",
            "--out",
            "out.png",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn casual_replies_keep_previous_prompts() {
        let mut prompts = LastPrompts::default();
        let structured = StructuredReply::parse(
            "Description: a knight\nPositive Prompt: 1girl, armor\nNegative Prompt: helmet",
        );
        assert!(prompts.remember(&structured));
        assert!(!prompts.remember(&StructuredReply::parse("Sure, happy to help!")));
        assert_eq!(prompts.positive(), Some("1girl, armor"));
        assert_eq!(prompts.negative(), "helmet");
    }

    #[test]
    fn exit_code_reflects_whether_an_image_was_written() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let out = temp.path().join("nested").join("out.png");
        assert_eq!(
            write_result(&GenerationResult::absent(), &out, None)?,
            EXIT_NOTHING_PRODUCED
        );
        assert!(!out.exists());

        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        let result = GenerationResult {
            image: Some(image.clone()),
            debug: Some(image),
        };
        let debug_out = temp.path().join("edges.png");
        assert_eq!(write_result(&result, &out, Some(&debug_out))?, EXIT_WRITTEN);
        assert!(out.exists());
        assert!(debug_out.exists());
        Ok(())
    }

    #[test]
    fn chat_numbering_only_advances_on_written_images() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut generated = 0;

        let saved = save_chat_result(
            &GenerationResult::absent(),
            temp.path(),
            JobMode::Inpaint,
            &mut generated,
        )?;
        assert!(saved.is_none());
        assert_eq!(generated, 0);

        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])));
        let result = GenerationResult {
            image: Some(image.clone()),
            debug: Some(image),
        };
        let saved = save_chat_result(&result, temp.path(), JobMode::Sketch, &mut generated)?;
        assert_eq!(saved, Some(temp.path().join("atelier-sketch-001.png")));
        assert!(temp.path().join("atelier-sketch-001-edges.png").exists());
        assert_eq!(generated, 1);
        Ok(())
    }

    #[test]
    fn chat_reports_missing_mask_before_generating() {
        let background = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let background_only = Canvas::new(background.clone(), Vec::new());
        let reason = missing_chat_input(JobMode::Inpaint, &background_only).unwrap_or_default();
        assert!(reason.contains("mask layer"));
        assert!(missing_chat_input(JobMode::Sketch, &background_only).is_none());

        let with_mask = Canvas::new(background, vec![DynamicImage::new_luma8(4, 4)]);
        assert!(missing_chat_input(JobMode::Inpaint, &with_mask).is_none());

        let nothing = Canvas::new(DynamicImage::new_rgba8(0, 0), Vec::new());
        assert!(missing_chat_input(JobMode::Sketch, &nothing).is_some());
    }

    #[test]
    fn chat_outputs_are_numbered() -> anyhow::Result<()> {
        let path = numbered_output(Path::new("renders"), "sketch", 7, "-edges");
        assert_eq!(path, Path::new("renders").join("atelier-sketch-007-edges.png"));

        let temp = tempfile::tempdir()?;
        let target = temp.path().join("a.png");
        save_png(&DynamicImage::new_rgb8(1, 1), &target)?;
        assert!(target.exists());
        Ok(())
    }
}
