mod server;

use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use stylegenie_contracts::catalog::OptionKind;
use stylegenie_contracts::endpoints::KnownWorkingFirst;
use stylegenie_contracts::events::{EventWriter, CONFIG_RELOADED, SESSION_STARTED};
use stylegenie_contracts::form::{parse_form_intent, FormAction, SESSION_HELP_COMMANDS};
use stylegenie_contracts::outfits::ParsedOutfits;
use stylegenie_contracts::preferences::{PreferenceField, StylePreferences};
use stylegenie_contracts::upload::UploadRequest;
use stylegenie_contracts::validation::ValidationError;
use stylegenie_engine::config::{config_path_from_env, ConfigSource, StyleGenieConfig};
use stylegenie_engine::photo::{attach_photo, LocalPhoto, PhotoAttachment, PhotoUploader};
use stylegenie_engine::session::{ResultView, StylingSession};
use stylegenie_engine::transport::HttpTransport;
use stylegenie_engine::trial::{EndpointTrialClient, TrialError};
use stylegenie_engine::upload::issuer_from_config;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stylegenie-rs", version, about = "StyleGenie outfit recommendation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Request outfit suggestions once.
    Recommend(RecommendArgs),
    /// Interactive preferences form.
    Session(SessionArgs),
    /// Issue one upload credential locally.
    UploadUrl(UploadUrlArgs),
    /// Serve the upload URL issuer over HTTP.
    Serve(ServeArgs),
    /// Print the selectable options.
    Options,
}

#[derive(Debug, Parser)]
struct RecommendArgs {
    #[arg(long)]
    occasion: Option<String>,
    #[arg(long)]
    body_type: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    age_range: Option<String>,
    #[arg(long)]
    extra_details: Option<String>,
    #[arg(long)]
    photo: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct UploadUrlArgs {
    #[arg(long)]
    file_name: String,
    #[arg(long)]
    file_type: String,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: String,
    #[arg(long)]
    config: Option<PathBuf>,
}

const EXIT_AGGREGATE_FAILURE: i32 = 2;
const LOADING_TICK: Duration = Duration::from_millis(250);

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("stylegenie-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    // The interactive form keeps candidate failures off the terminal unless
    // RUST_LOG asks for them.
    let default_filter = match cli.command {
        Command::Session(_) => "off",
        _ => "info",
    };
    init_tracing(default_filter);
    match cli.command {
        Command::Recommend(args) => run_recommend(args),
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
        Command::UploadUrl(args) => run_upload_url(args),
        Command::Serve(args) => run_serve(args),
        Command::Options => {
            print_options();
            Ok(0)
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn open_config(path: Option<PathBuf>) -> Result<ConfigSource> {
    ConfigSource::open(path.or_else(config_path_from_env))
}

fn event_writer(path: Option<PathBuf>) -> Option<EventWriter> {
    path.map(|path| EventWriter::new(path, uuid::Uuid::new_v4().to_string()))
}

fn trial_client(
    config: &StyleGenieConfig,
    events: Option<EventWriter>,
) -> Result<EndpointTrialClient<HttpTransport>> {
    let transport = HttpTransport::new(config.request_timeout())?;
    Ok(EndpointTrialClient::new(transport).with_events(events))
}

fn photo_uploader(config: &StyleGenieConfig) -> Option<PhotoUploader> {
    match PhotoUploader::from_config(&config.upload, config.request_timeout()) {
        Ok(uploader) => uploader,
        Err(err) => {
            tracing::warn!(error = %err, "photo upload disabled");
            None
        }
    }
}

fn load_photo(
    path: &Path,
    config: &StyleGenieConfig,
    events: Option<&EventWriter>,
) -> Result<PhotoAttachment> {
    let photo = LocalPhoto::load(path, config.max_photo_bytes)?;
    let uploader = photo_uploader(config);
    Ok(attach_photo(&photo, uploader.as_ref(), events))
}

fn run_recommend(args: RecommendArgs) -> Result<i32> {
    let source = open_config(args.config)?;
    let config = source.config();
    let events = event_writer(args.events);

    let mut preferences = StylePreferences::default();
    let fields = [
        (PreferenceField::Occasion, args.occasion),
        (PreferenceField::BodyType, args.body_type),
        (PreferenceField::Gender, args.gender),
        (PreferenceField::Country, args.country),
        (PreferenceField::AgeRange, args.age_range),
        (PreferenceField::ExtraDetails, args.extra_details),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            preferences.set_field(field, &value)?;
        }
    }
    if let Err(err) = preferences.validate() {
        print_validation(&err);
        return Ok(1);
    }
    if let Some(path) = args.photo.as_ref() {
        let attachment = load_photo(path, config, events.as_ref())?;
        if let Some(warning) = attachment.warning {
            eprintln!("{warning}");
        }
        preferences.photo_reference = Some(attachment.reference().to_string());
    }

    let client = trial_client(config, events)?;
    let mut strategy = KnownWorkingFirst::new();
    match client.run(&mut strategy, &config.endpoint_list(), &preferences) {
        Ok(success) => {
            if args.json {
                let payload = json!({
                    "endpoint": success.endpoint,
                    "attempts": success.attempts,
                    "outfit_suggestions": success.outfits.suggestions,
                    "historical_fashion": success.outfits.historical_fashion,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_outfits(&success.outfits);
            }
            Ok(0)
        }
        Err(TrialError::Invalid(err)) => {
            print_validation(&err);
            Ok(1)
        }
        Err(TrialError::NoCandidates) => bail!(
            "no styling endpoints are configured; set STYLEGENIE_ENDPOINTS or add endpoints to the config file"
        ),
        Err(TrialError::Exhausted(aggregate)) => {
            eprintln!("{}", aggregate.user_message());
            Ok(EXIT_AGGREGATE_FAILURE)
        }
    }
}

fn run_session(args: SessionArgs) -> Result<()> {
    let mut source = open_config(args.config)?;
    let events = event_writer(args.events);
    if let Some(events) = events.as_ref() {
        emit(
            events,
            SESSION_STARTED,
            json!({ "endpoints": source.config().endpoints.len() }),
        );
    }

    let mut session = StylingSession::new();
    let stdin = io::stdin();
    let mut line = String::new();

    println!("StyleGenie session started. Type /help for commands.");

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

        let intent = parse_form_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action {
            FormAction::Noop => continue,
            FormAction::SetField { field, value } => {
                match session.preferences_mut().set_field(field, &value) {
                    Ok(()) => println!(
                        "{} set to {}",
                        field_label(field),
                        session.preferences().field_value(field).unwrap_or("")
                    ),
                    Err(err) => println!("{err}"),
                }
            }
            FormAction::ClearField(field) => {
                session.preferences_mut().clear_field(field);
                println!("{} cleared", field_label(field));
            }
            FormAction::SetDetails(text) => {
                session.preferences_mut().extra_details = Some(text);
                println!("Style details updated");
            }
            FormAction::SetPhoto(path) => {
                let path = PathBuf::from(path);
                match load_photo(&path, source.config(), events.as_ref()) {
                    Ok(attachment) => {
                        if let Some(warning) = attachment.warning {
                            println!("{warning}");
                        }
                        println!("Photo attached: {}", attachment.file_name);
                        session.attach_photo(attachment);
                    }
                    Err(err) => println!("Photo not attached: {err:#}"),
                }
            }
            FormAction::ClearPhoto => {
                session.clear_photo();
                println!("Photo removed");
            }
            action @ (FormAction::Submit | FormAction::Retry) => {
                reload_if_changed(&mut source, events.as_ref());
                let retry = action == FormAction::Retry;
                let client = trial_client(source.config(), events.clone())?;
                let candidates = source.config().endpoint_list();
                let outcome = thread::scope(|scope| {
                    let worker = scope.spawn(|| {
                        let view = if retry {
                            session.retry(&client, &candidates)
                        } else {
                            session.submit(&client, &candidates)
                        };
                        view.cloned()
                    });
                    print!("Finding outfits");
                    let _ = io::stdout().flush();
                    while !worker.is_finished() {
                        thread::sleep(LOADING_TICK);
                        print!(".");
                        let _ = io::stdout().flush();
                    }
                    println!();
                    worker.join()
                })
                .map_err(|_| anyhow!("styling request worker panicked"))?;
                match outcome {
                    Ok(view) => print_view(&view),
                    Err(err) => print_validation(&err),
                }
            }
            FormAction::Status => print_status(&session, &source),
            FormAction::Reload => match source.force_reload() {
                Ok(()) => {
                    println!(
                        "Config reloaded ({} endpoints)",
                        source.config().endpoints.len()
                    );
                    emit_reload(events.as_ref(), &source);
                }
                Err(err) => println!("Reload failed, keeping previous config: {err:#}"),
            },
            FormAction::Options => print_options(),
            FormAction::Help => {
                println!("Commands: {}", SESSION_HELP_COMMANDS.join(" "));
                println!("Plain text sets style details.");
            }
            FormAction::Quit => break,
            FormAction::Unknown {
                command,
                suggestion,
                ..
            } => match suggestion {
                Some(hint) => println!("Unknown command: /{command} (did you mean /{hint}?)"),
                None => println!("Unknown command: /{command}"),
            },
        }
    }
    Ok(())
}

fn reload_if_changed(source: &mut ConfigSource, events: Option<&EventWriter>) {
    match source.reload_if_changed() {
        Ok(true) => {
            tracing::info!(
                endpoints = source.config().endpoints.len(),
                "config reloaded"
            );
            emit_reload(events, source);
        }
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "config reload failed; keeping previous config")
        }
    }
}

fn emit_reload(events: Option<&EventWriter>, source: &ConfigSource) {
    if let Some(events) = events {
        emit(
            events,
            CONFIG_RELOADED,
            json!({ "endpoints": source.config().endpoints }),
        );
    }
}

fn emit(events: &EventWriter, event_type: &str, payload: Value) {
    if let Err(err) = events.emit_json(event_type, payload) {
        tracing::warn!(error = %err, "failed writing {event_type} event");
    }
}

fn run_upload_url(args: UploadUrlArgs) -> Result<i32> {
    let source = open_config(args.config)?;
    let issuer = issuer_from_config(&source.config().upload);
    let credential = issuer
        .issue(&UploadRequest::new(args.file_name, args.file_type))
        .context("failed issuing upload URL")?;
    println!("{}", serde_json::to_string_pretty(&credential)?);
    Ok(0)
}

fn run_serve(args: ServeArgs) -> Result<i32> {
    let source = open_config(args.config)?;
    let issuer = issuer_from_config(&source.config().upload);
    server::serve(&args.bind, issuer)?;
    Ok(0)
}

fn field_label(field: PreferenceField) -> &'static str {
    match field {
        PreferenceField::Occasion => "Occasion",
        PreferenceField::BodyType => "Body type",
        PreferenceField::Gender => "Gender",
        PreferenceField::Country => "Country",
        PreferenceField::AgeRange => "Age range",
        PreferenceField::ExtraDetails => "Style details",
    }
}

fn print_validation(err: &ValidationError) {
    for field in &err.fields {
        eprintln!("{}: {}", field.field, field.message);
    }
}

fn print_view(view: &ResultView) {
    match view {
        ResultView::Empty => {}
        ResultView::Suggestions { outfits, .. } => print_outfits(outfits),
        ResultView::Failed { message, .. } => {
            println!("{message}");
            println!("Type /retry to try again.");
        }
    }
}

fn print_outfits(outfits: &ParsedOutfits) {
    if outfits.suggestions.is_empty() {
        println!("No outfit suggestions were returned.");
    }
    for (idx, suggestion) in outfits.suggestions.iter().enumerate() {
        println!("{}. {}", idx + 1, suggestion.description);
        if let Some(url) = suggestion.image_url.as_deref() {
            println!("   image: {url}");
        }
    }
    if !outfits.historical_fashion.is_empty() {
        println!("Through the years:");
        for item in &outfits.historical_fashion {
            println!(
                "  {} - {}",
                item.year,
                item.image_url.as_deref().unwrap_or("")
            );
        }
    }
}

fn print_status(session: &StylingSession, source: &ConfigSource) {
    let prefs = session.preferences();
    for field in PreferenceField::ALL {
        println!(
            "{}: {}",
            field_label(field),
            prefs.field_value(field).unwrap_or("-")
        );
    }
    match session.photo() {
        Some(photo) if photo.remote_url.is_some() => {
            println!("Photo: {} (uploaded)", photo.file_name)
        }
        Some(photo) => println!("Photo: {} (local preview)", photo.file_name),
        None => println!("Photo: -"),
    }
    println!("Endpoints: {}", source.config().endpoints.len());
    println!(
        "Known-working endpoint: {}",
        session.known_working().unwrap_or("-")
    );
    if session.view().is_retryable() {
        println!("Last request failed. Type /retry to try again.");
    }
}

fn print_options() {
    for kind in OptionKind::ALL {
        println!("{}:", capitalize(kind.label()));
        for option in kind.options() {
            if option.description.is_empty() {
                println!("  {}", option.value);
            } else {
                println!("  {:<18} {}", option.value, option.description);
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
