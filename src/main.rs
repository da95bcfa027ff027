use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use speechdesk::db::{self, DEFAULT_TRANSLATION_PROMPT, SettingKey, SettingsStore, resolve_microphone};
use speechdesk::recognition::{
    AzureRecognizer, RecognitionController, RecognitionRequest, TranslationSettings, Update,
};
use speechdesk::translation::TranslationGateway;
use speechdesk::tts::{
    AzureSynthesizer, CatalogClient, SynthesisAuth, SynthesisController, TtsForm, VoiceCatalog,
};
use speechdesk::voice::{SpeakerDestination, list_audio_inputs};
use speechdesk::Config;

/// Speechdesk - Speech recognition with LLM translation, and text-to-speech
#[derive(Parser)]
#[command(name = "speechdesk", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List microphones
    Devices,
    /// Show or change stored preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Transcribe the microphone until interrupted
    Listen,
    /// List voices of the configured region
    Voices {
        /// Only show voices of this locale
        #[arg(short, long)]
        locale: Option<String>,
    },
    /// Print the SSML document for a selection
    Ssml(SelectionArgs),
    /// Synthesize a selection and play it
    Speak(SelectionArgs),
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show every preference
    Show,
    /// Print one preference
    Get {
        /// Setting name (e.g. region, language, llmPrompt)
        key: SettingKey,
    },
    /// Store one preference
    Set {
        /// Setting name
        key: SettingKey,
        /// New value
        value: String,
    },
    /// Reset the translation prompt to the built-in default
    DefaultPrompt,
}

#[derive(Args)]
struct SelectionArgs {
    /// Voice language
    #[arg(short, long)]
    language: Option<String>,
    /// Voice short name (first voice of the language when omitted)
    #[arg(long)]
    voice: Option<String>,
    /// Style index (0 = general)
    #[arg(long, default_value = "0")]
    style: usize,
    /// Role-play index (0 = default)
    #[arg(long, default_value = "0")]
    role: usize,
    /// Secondary locale index (0 = voice language)
    #[arg(long, default_value = "0")]
    secondary_locale: usize,
    /// Pitch offset in percent
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pitch: i32,
    /// Speed offset in percent
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    speed: i32,
    /// Text to speak (sample text of the language when omitted)
    text: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,speechdesk=info",
        1 => "info,speechdesk=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let pool = db::init(config.settings_db_path())?;
    let store = SettingsStore::new(pool);

    match cli.command {
        Command::Devices => {
            cmd_devices(&store);
            Ok(())
        }
        Command::Settings { action } => cmd_settings(&store, action),
        Command::Listen => cmd_listen(&config, &store).await,
        Command::Voices { locale } => cmd_voices(&config, &store, locale.as_deref()).await,
        Command::Ssml(args) => {
            let (form, _) = build_form(&config, &store, &args).await?;
            println!("{}", form.ssml());
            Ok(())
        }
        Command::Speak(args) => cmd_speak(&config, &store, &args).await,
    }
}

fn cmd_devices(store: &SettingsStore) {
    let inputs = list_audio_inputs();
    let selected = resolve_microphone(&store.get(SettingKey::Microphone), &inputs);

    if inputs.is_empty() {
        println!("No microphones found");
        return;
    }
    for input in &inputs {
        let marker = if input.id == selected { "*" } else { " " };
        println!("{marker} {:<40} {}", input.label, input.id);
    }
}

fn cmd_settings(store: &SettingsStore, action: SettingsAction) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => {
            for key in SettingKey::ALL {
                println!("{key:<16} {}", display_value(key, &store.get(key)));
            }
        }
        SettingsAction::Get { key } => println!("{}", store.get(key)),
        SettingsAction::Set { key, value } => {
            store.write(key, &value)?;
            println!("{key} = {}", display_value(key, &value));
        }
        SettingsAction::DefaultPrompt => {
            store.reset_prompt();
            println!("{DEFAULT_TRANSLATION_PROMPT}");
        }
    }
    Ok(())
}

fn display_value(key: SettingKey, value: &str) -> String {
    if key.is_secret() && !value.is_empty() {
        "********".to_string()
    } else {
        value.to_string()
    }
}

async fn cmd_listen(config: &Config, store: &SettingsStore) -> anyhow::Result<()> {
    let settings = store.load();
    let microphone = resolve_microphone(&settings.microphone, &list_audio_inputs());

    let mut controller = RecognitionController::new(
        Arc::new(AzureRecognizer::new(config.recognition.clone())),
        Arc::new(TranslationGateway::new(config.translation.clone())),
        TranslationSettings {
            enabled: settings.translation_enabled,
            api_key: SecretString::from(settings.translation_api_key),
            prompt: settings.translation_prompt,
        },
    );

    let request = RecognitionRequest {
        subscription_key: SecretString::from(settings.subscription_key),
        region: settings.region,
        language: settings.language,
        microphone,
    };

    eprintln!("{}", controller.status());
    if let Err(e) = controller.start(request).await {
        if e.is_alert() {
            eprintln!("{e}");
            return Ok(());
        }
        return Err(e.into());
    }
    eprintln!("{} (Ctrl+C to stop)", controller.status());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let next = tokio::select! {
            _ = &mut ctrl_c => None,
            event = controller.next_event() => event,
        };

        let Some(event) = next else {
            eprintln!("Stopping...");
            for update in controller.stop().await {
                print_update(&update);
            }
            break;
        };

        let mut stopped = false;
        for update in controller.handle_event(event).await {
            stopped |= print_update(&update);
        }
        if stopped {
            break;
        }
    }

    eprintln!("{}", controller.status());
    Ok(())
}

/// Print one update; returns true when the session ended
fn print_update(update: &Update) -> bool {
    match update {
        Update::Interim(text) => eprintln!("... {text}"),
        Update::Final(text) => println!("{text}"),
        Update::NoMatch => println!("{}", speechdesk::recognition::NO_MATCH_MARKER),
        Update::Translated(text) => println!("> {text}"),
        Update::Alert(message) | Update::Error(message) => eprintln!("{message}"),
        Update::Stopped => return true,
    }
    false
}

/// Fetch the voice catalog; the issued token is returned for synthesis
async fn load_catalog(
    config: &Config,
    store: &SettingsStore,
) -> anyhow::Result<(VoiceCatalog, SecretString)> {
    let region = store.get(SettingKey::Region);
    let key = store.get(SettingKey::SubscriptionKey);
    if key.trim().is_empty() {
        anyhow::bail!(speechdesk::recognition::MISSING_CREDENTIALS);
    }

    let client = CatalogClient::new(&config.tts.voices_endpoint, &config.tts.token_endpoint);
    let token = client.issue_token(&region, &SecretString::from(key)).await?;
    let (catalog, error) = client
        .load(&region, &token, &config.tts.preview_marker)
        .await;
    if let Some(e) = error {
        eprintln!("{}", config.tts.retry_message);
        return Err(e.into());
    }
    Ok((catalog, token))
}

async fn cmd_voices(
    config: &Config,
    store: &SettingsStore,
    locale: Option<&str>,
) -> anyhow::Result<()> {
    let (catalog, _) = load_catalog(config, store).await?;
    let locales: Vec<&str> = match locale {
        Some(locale) => vec![locale],
        None => catalog.locales().collect(),
    };

    for locale in locales {
        println!("{} [{locale}]", catalog.locale_name(locale));
        for voice in catalog.voices_for(locale) {
            println!("  {:<40} {}", voice.short_name, voice.label);
        }
    }
    Ok(())
}

async fn build_form(
    config: &Config,
    store: &SettingsStore,
    args: &SelectionArgs,
) -> anyhow::Result<(TtsForm, SecretString)> {
    let (catalog, token) = load_catalog(config, store).await?;
    let mut form = TtsForm::new(catalog, config.tts.default_texts.clone());

    if let Some(language) = &args.language {
        form.select_language(language)?;
    }
    if let Some(voice) = &args.voice {
        form.select_voice_named(voice)?;
    }
    if args.style > 0 {
        form.select_style(args.style)?;
    }
    if args.role > 0 {
        form.select_role_play(args.role)?;
    }
    // A secondary locale locks pitch and speed at the values set before it
    form.set_pitch(args.pitch);
    form.set_speed(args.speed);
    if args.secondary_locale > 0 {
        form.select_secondary_locale(args.secondary_locale)?;
    }
    if let Some(text) = &args.text {
        form.set_text(text.as_str());
    }

    tracing::debug!(
        voice = ?form.voice_name(),
        pitch = %form.pitch_label(),
        speed = %form.speed_label(),
        "selection ready"
    );
    Ok((form, token))
}

async fn cmd_speak(
    config: &Config,
    store: &SettingsStore,
    args: &SelectionArgs,
) -> anyhow::Result<()> {
    let (form, token) = build_form(config, store, args).await?;
    let region = store.get(SettingKey::Region);

    let mut controller = SynthesisController::new(
        Arc::new(AzureSynthesizer::new(
            &config.tts,
            &region,
            SynthesisAuth::Token(token),
        )),
        Arc::new(SpeakerDestination::new()),
        config.tts.retry_message.clone(),
    );

    if let Err(e) = controller.play(form.ssml()).await {
        eprintln!("{}", controller.status());
        return Err(e.into());
    }

    tokio::select! {
        () = controller.wait_for_end() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    controller.stop();
    Ok(())
}
