mod app;
mod attach;
mod command;
mod event;
mod fragments;
mod math;
mod offline;
mod session_log;
mod theme;
mod ui;
mod util;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use clap::Parser;
use crossterm::event::{Event as TermEvent, MouseEventKind};
use ratatui::DefaultTerminal;
use soru::config::soru_home;
use soru::{
    AccountService, AnswerChoice, ApprovalStore, FirebaseAuth, FirestoreApprovals,
    IdentityProvider, SessionFile, SessionGate, SessionState, SolveWorkflow, SolverBackend,
    SoruConfig, Subject, resolve_session,
};
use tokio::sync::mpsc;

use app::{Action, App};
use event::AppEvent;
use fragments::Tone;
use math::MathTypesetter;
use session_log::SessionLogger;

type FirebaseAccounts = AccountService<Arc<FirebaseAuth>, Arc<FirestoreApprovals>>;

#[derive(Parser)]
#[command(name = "soru", about = "Sınav sorularını adım adım çözen terminal uygulaması")]
struct Args {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY")]
    gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long)]
    model: Option<String>,

    /// Base URL for the Gemini API
    #[arg(long)]
    gemini_base_url: Option<String>,

    /// Firebase web API key
    #[arg(long, env = "FIREBASE_API_KEY")]
    firebase_api_key: Option<String>,

    /// Firebase project id (Firestore `users` collection)
    #[arg(long, env = "FIREBASE_PROJECT_ID")]
    firebase_project_id: Option<String>,

    /// Skip sign-in and approval; a single local user is always approved
    #[arg(long)]
    offline: bool,

    /// Disable mouse scroll support (re-enables terminal text selection)
    #[arg(long)]
    no_mouse: bool,

    /// Delete all soru data (~/.soru/) and exit
    #[arg(long)]
    reset: bool,

    /// Run headlessly: solve --image once, print the solution, exit
    #[arg(short = 'p', long = "print", requires = "image")]
    print: bool,

    /// Question photo (PNG, JPEG or WebP) for --print
    #[arg(long)]
    image: Option<PathBuf>,

    /// Subject for --print, e.g. "Matematik" or "cografya"
    #[arg(long, default_value = "Matematik")]
    subject: Subject,

    /// Answer marked on the sheet for --print (A-E)
    #[arg(long)]
    answer: Option<AnswerChoice>,

    /// After the first solution, ask for a corrected one with this note
    #[arg(long, requires = "print")]
    correction: Option<String>,
}

fn cleanup_terminal(mouse: bool) {
    if mouse {
        let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableMouseCapture);
    }
    ratatui::restore();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up file-based tracing (logs go to ~/.soru/soru.log)
    {
        let log_dir = soru_home();
        std::fs::create_dir_all(&log_dir).ok();
        let log_file = std::fs::File::create(log_dir.join("soru.log"))?;

        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_from_env("SORU_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    }

    let args = Args::parse();

    if args.reset {
        return reset();
    }

    // CLI env/flags override stored config
    let mut config = SoruConfig::load().unwrap_or_default();
    if let Some(key) = &args.gemini_api_key {
        config.gemini_api_key = Some(key.clone());
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(url) = &args.gemini_base_url {
        config.gemini_base_url = Some(url.clone());
    }
    if let Some(key) = &args.firebase_api_key {
        config.firebase_api_key = Some(key.clone());
    }
    if let Some(project) = &args.firebase_project_id {
        config.firebase_project_id = Some(project.clone());
    }
    if !args.print
        && let Err(e) = config.save()
    {
        tracing::warn!(error = %e, "failed to save config");
    }

    let Some(gemini) = config.gemini_client() else {
        bail!("Gemini API anahtarı yok. --gemini-api-key veya GEMINI_API_KEY ile verin.");
    };
    if !args.offline && config.firebase().is_none() {
        bail!(
            "Firebase ayarları eksik. --firebase-api-key ve --firebase-project-id verin \
             ya da --offline ile çalıştırın."
        );
    }
    let backend: Arc<dyn SolverBackend> = Arc::new(gemini);

    if args.print {
        if !args.offline {
            require_approved_session(&config).await?;
        }
        let Some(path) = args.image.as_deref() else {
            bail!("--print için --image gerekli");
        };
        let image = attach::load_path(&attach::expand_path(&path.to_string_lossy()))?;
        let answer = args.answer.unwrap_or_default();
        return run_headless(
            backend.as_ref(),
            image,
            args.subject,
            answer,
            args.correction.as_deref(),
        )
        .await;
    }

    let (provider, store, accounts): (
        Arc<dyn IdentityProvider>,
        Arc<dyn ApprovalStore>,
        Option<Arc<FirebaseAccounts>>,
    ) = match config.firebase() {
        Some((api_key, project_id)) if !args.offline => {
            let auth =
                Arc::new(FirebaseAuth::new(api_key).with_session_file(SessionFile::default_location()));
            if let Err(e) = auth.restore().await {
                tracing::warn!(error = %e, "could not restore saved session");
            }
            let approvals = Arc::new(FirestoreApprovals::new(project_id));
            let accounts = Arc::new(AccountService::new(Arc::clone(&auth), Arc::clone(&approvals)));
            let provider: Arc<dyn IdentityProvider> = auth;
            let store: Arc<dyn ApprovalStore> = approvals;
            (provider, store, Some(accounts))
        }
        _ => {
            let provider: Arc<dyn IdentityProvider> = Arc::new(offline::LocalProvider);
            let store: Arc<dyn ApprovalStore> = Arc::new(offline::ApproveAll);
            (provider, store, None)
        }
    };
    let gate = SessionGate::start(provider, store);

    let log = match SessionLogger::new(&soru_home().join("sessions"), &config.model) {
        Ok(log) => {
            tracing::info!(path = %log.path().display(), "session log");
            Some(log)
        }
        Err(e) => {
            tracing::warn!(error = %e, "session log disabled");
            None
        }
    };
    let app = App::new(config.model.clone(), args.offline, log);

    let mouse = !args.no_mouse;
    // Install panic hook that restores the terminal
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal(mouse);
        default_hook(info);
    }));

    let terminal = ratatui::init();
    if mouse {
        crossterm::execute!(std::io::stdout(), crossterm::event::EnableMouseCapture)?;
    }

    let services = Services {
        backend,
        accounts,
        gate,
    };
    let result = run_app(terminal, app, services).await;
    cleanup_terminal(mouse);
    result
}

fn reset() -> anyhow::Result<()> {
    use std::io::Write;

    let dir = soru_home();
    eprintln!();
    eprintln!("  Bu işlem tüm soru verilerini kalıcı olarak siler:");
    eprintln!("    ayarlar, oturum, geçmiş   {}", dir.display());
    eprintln!();
    eprint!("  Emin misiniz? [e/H] ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("e") || answer.eq_ignore_ascii_case("y") {
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        eprintln!("  Tamam. Tüm veriler silindi.");
    } else {
        eprintln!("  Vazgeçildi.");
    }
    eprintln!();
    Ok(())
}

/// Resume the saved sign-in and check approval once.
async fn require_approved_session(config: &SoruConfig) -> anyhow::Result<()> {
    let Some((api_key, project_id)) = config.firebase() else {
        bail!("Firebase ayarları eksik");
    };
    let auth = FirebaseAuth::new(api_key).with_session_file(SessionFile::default_location());
    let identity = auth
        .restore()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    let lookup = match &identity {
        Some(id) => FirestoreApprovals::new(project_id).approval(id).await,
        None => Ok(None),
    };
    match resolve_session(identity, lookup) {
        SessionState::Approved(_) => Ok(()),
        SessionState::Unapproved(id) => {
            bail!("{} hesabı henüz yönetici tarafından onaylanmadı.", id.display_name())
        }
        SessionState::Loading | SessionState::LoggedOut => {
            bail!("Kayıtlı oturum yok. Önce `soru` ile giriş yapın.")
        }
    }
}

async fn run_headless(
    backend: &dyn SolverBackend,
    image: soru::ImageHandle,
    subject: Subject,
    answer: AnswerChoice,
    correction: Option<&str>,
) -> anyhow::Result<()> {
    let mut workflow = SolveWorkflow::new();
    workflow.select_image(image);
    workflow.select_subject(subject)?;

    let ticket = workflow.begin_solve(answer)?;
    let (epoch, result) = ticket.run(backend).await;
    workflow.complete_solve(epoch, result);

    if let Some(note) = correction
        && workflow.solution().is_some()
    {
        workflow.request_correction()?;
        let ticket = workflow.submit_correction(note)?;
        let (epoch, result) = ticket.run(backend).await;
        workflow.complete_solve(epoch, result);
    }

    let Some(solution) = workflow.solution() else {
        let message = workflow.error_message().unwrap_or_default();
        eprintln!("hata: {message}");
        std::process::exit(1);
    };

    let math = MathTypesetter;
    let section = |title: &str, text: &str| {
        println!("{title}");
        for line in fragments::plain_lines(&fragments::render_text(text, Tone::Body, &math)) {
            println!("{line}");
        }
        println!();
    };

    println!("{}", ui::solution_title(subject));
    println!();
    section(ui::SIMPLIFIED_TITLE, &solution.simplified_question);
    section(ui::STEPS_TITLE, &solution.solution_steps);
    let final_answer =
        fragments::plain_lines(&fragments::render_text(&solution.final_answer, Tone::FinalAnswer, &math))
            .join(" ");
    println!("{}{final_answer}", ui::FINAL_ANSWER_TITLE);
    println!();
    section(ui::RECOMMENDATIONS_TITLE, &solution.recommendations);
    Ok(())
}

/// Long-lived handles the event loop performs actions with.
struct Services {
    backend: Arc<dyn SolverBackend>,
    /// `None` when offline.
    accounts: Option<Arc<FirebaseAccounts>>,
    gate: SessionGate,
}

async fn run_app(
    mut terminal: DefaultTerminal,
    mut app: App,
    services: Services,
) -> anyhow::Result<()> {
    // Unified event channel
    let (app_tx, mut app_rx) = mpsc::unbounded_channel::<AppEvent>();

    // Stop flag for the event reader thread
    let stop = Arc::new(AtomicBool::new(false));

    // Spawn terminal event reader using poll() with timeout so it can stop
    let term_tx = app_tx.clone();
    let stop_reader = Arc::clone(&stop);
    tokio::task::spawn_blocking(move || {
        while !stop_reader.load(Ordering::Relaxed) {
            // Poll with 50ms timeout so we can check the stop flag
            if crossterm::event::poll(Duration::from_millis(50)).unwrap_or(false) {
                match crossterm::event::read() {
                    Ok(ev) => {
                        if term_tx.send(AppEvent::Terminal(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    });

    // Tick timer for spinners and toast expiry
    let tick_tx = app_tx.clone();
    let stop_tick = Arc::clone(&stop);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            interval.tick().await;
            if stop_tick.load(Ordering::Relaxed) {
                break;
            }
            if tick_tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    // SIGTERM handler for graceful shutdown
    let sigterm_tx = app_tx.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sig) = signal(SignalKind::terminate()) {
            sig.recv().await;
            let _ = sigterm_tx.send(AppEvent::Quit);
        }
    });

    // Forward every published session state; ends when the gate is dropped
    let mut session_rx = services.gate.watch();
    let session_tx = app_tx.clone();
    tokio::spawn(async move {
        loop {
            let state = session_rx.borrow_and_update().clone();
            if session_tx.send(AppEvent::Session(state)).is_err() {
                break;
            }
            if session_rx.changed().await.is_err() {
                break;
            }
        }
    });

    let result = loop {
        // Draw only when dirty
        if app.dirty {
            app.prepare_render();
            if let Err(e) = terminal.draw(|frame| ui::draw(frame, &app)) {
                break Err(e.into());
            }
            app.dirty = false;
        }

        // Wait for next event
        let Some(event) = app_rx.recv().await else {
            break Ok(());
        };

        let action = match event {
            AppEvent::Terminal(TermEvent::Key(key)) => app.handle_key(key),
            AppEvent::Terminal(TermEvent::Mouse(mouse)) => {
                match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_up(3),
                    MouseEventKind::ScrollDown => app.scroll_down(3),
                    _ => {}
                }
                None
            }
            AppEvent::Terminal(TermEvent::Resize(..)) => {
                app.dirty = true;
                None
            }
            AppEvent::Terminal(_) => None,
            AppEvent::Session(state) => {
                app.set_session(state);
                None
            }
            AppEvent::Solved {
                epoch,
                result,
                elapsed_ms,
            } => {
                app.solve_finished(epoch, result, elapsed_ms);
                None
            }
            AppEvent::ChatReply { epoch, result } => {
                app.chat_finished(epoch, result);
                None
            }
            AppEvent::Account(result) => {
                app.account_finished(result);
                None
            }
            AppEvent::Tick => {
                app.on_tick();
                None
            }
            AppEvent::Quit => Some(Action::Quit),
        };

        if let Some(action) = action
            && perform(action, &mut app, &services, &app_tx).await
        {
            break Ok(());
        }
    };

    stop.store(true, Ordering::Relaxed);
    result
}

/// Carry out an action. Returns `true` when the app should exit.
async fn perform(
    action: Action,
    app: &mut App,
    services: &Services,
    app_tx: &mpsc::UnboundedSender<AppEvent>,
) -> bool {
    match action {
        Action::Solve(ticket) => {
            let backend = Arc::clone(&services.backend);
            let tx = app_tx.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                let (epoch, result) = ticket.run(backend.as_ref()).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let _ = tx.send(AppEvent::Solved {
                    epoch,
                    result,
                    elapsed_ms,
                });
            });
        }
        Action::Chat(ticket) => {
            let backend = Arc::clone(&services.backend);
            let tx = app_tx.clone();
            tokio::spawn(async move {
                let (epoch, result) = ticket.run(backend.as_ref()).await;
                let _ = tx.send(AppEvent::ChatReply { epoch, result });
            });
        }
        Action::SignIn(form) => match &services.accounts {
            Some(accounts) => {
                let accounts = Arc::clone(accounts);
                let tx = app_tx.clone();
                tokio::spawn(async move {
                    let result = accounts.sign_in(&form).await.map(|_| ());
                    let _ = tx.send(AppEvent::Account(result));
                });
            }
            None => app.account_finished(Ok(())),
        },
        Action::SignUp(form) => match &services.accounts {
            Some(accounts) => {
                let accounts = Arc::clone(accounts);
                let tx = app_tx.clone();
                tokio::spawn(async move {
                    let result = accounts.sign_up(&form).await.map(|_| ());
                    let _ = tx.send(AppEvent::Account(result));
                });
            }
            None => app.account_finished(Ok(())),
        },
        Action::LoadImage(path) => match attach::load_path(&path) {
            Ok(image) => app.image_loaded(image, attach::label_for(&path)),
            Err(e) => app.notify_error(format!("{e:#}")),
        },
        Action::Paste => match attach::from_clipboard() {
            Ok(image) => app.image_loaded(image, "Pano".to_string()),
            Err(e) => app.notify_error(format!("{e:#}")),
        },
        Action::Logout => {
            if app.offline {
                return true;
            }
            services.gate.logout().await;
        }
        Action::Quit => return true,
    }
    false
}
