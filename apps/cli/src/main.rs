use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client_core::{
    error::OtpError, load_settings, AuthFlow, AuthService, AuthSession, CarouselStep,
    ClientSettings, FlowEvent, HttpAuthService, OtpSession, OtpTimings, ResendOutcome,
    Screen, SubmitOutcome, VerifyOutcome,
};
use shared::domain::{gender_label, Field};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "auth-cli", about = "Sign-up, sign-in and OTP verification client")]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walks the welcome carousel.
    Onboard {
        #[arg(long)]
        skip: bool,
    },
    /// Creates an account, then prompts for the emailed code.
    SignUp {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// YYYY-MM-DD
        #[arg(long)]
        birth_date: NaiveDate,
        #[arg(long)]
        gender: String,
    },
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    VerifyOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
    ResendOtp {
        #[arg(long)]
        email: String,
    },
    /// Fetches the profile behind a bearer token.
    Whoami {
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_base_url) = cli.api_base_url {
        settings.api_base_url = api_base_url;
    }
    let service: Arc<dyn AuthService> = Arc::new(
        HttpAuthService::from_settings(&settings).context("failed to build auth client")?,
    );

    match cli.command {
        Command::Onboard { skip } => onboard(service, &settings, skip),
        Command::SignUp {
            first_name,
            last_name,
            email,
            password,
            birth_date,
            gender,
        } => {
            let mut flow = AuthFlow::new(service, &settings);
            let printer = spawn_event_printer(flow.subscribe_events());
            flow.open_sign_up();
            flow.update_sign_up(Field::FirstName, first_name)?;
            flow.update_sign_up(Field::LastName, last_name)?;
            flow.update_sign_up(Field::EmailAddress, email)?;
            flow.update_sign_up(Field::Password, password)?;
            flow.update_sign_up(Field::BirthDate, birth_date)?;
            flow.update_sign_up(Field::Gender, gender)?;

            let outcome = flow.submit_sign_up().await;
            let result = match outcome {
                SubmitOutcome::Accepted { .. } => prompt_for_code(&mut flow).await,
                SubmitOutcome::Invalid(errors) => Err(anyhow!("invalid input: {errors}")),
                SubmitOutcome::Rejected(message) => Err(anyhow!(message)),
            };
            printer.abort();
            result
        }
        Command::SignIn { email, password } => {
            let mut flow = AuthFlow::new(service, &settings);
            let printer = spawn_event_printer(flow.subscribe_events());
            flow.open_sign_in();
            flow.update_sign_in(Field::EmailAddress, email)?;
            flow.update_sign_in(Field::Password, password)?;

            let outcome = flow.submit_sign_in().await;
            printer.abort();
            match outcome {
                SubmitOutcome::Accepted { session, .. } => {
                    print_session(session.as_ref());
                    Ok(())
                }
                SubmitOutcome::Invalid(errors) => bail!("invalid input: {errors}"),
                SubmitOutcome::Rejected(message) => bail!(message),
            }
        }
        Command::VerifyOtp { email, code } => {
            let otp = OtpSession::new(service, OtpTimings::from(&settings));
            otp.open(email).await;
            otp.set_code(&code).await?;
            match otp.verify().await? {
                VerifyOutcome::Verified(session) => {
                    println!("OTP verified!");
                    print_session(session.as_ref());
                    Ok(())
                }
                VerifyOutcome::Rejected(message) => bail!(message),
                VerifyOutcome::Stale => bail!("verification was superseded"),
            }
        }
        Command::ResendOtp { email } => {
            // A fresh session has no cooldown to honour.
            let otp = OtpSession::new(
                service,
                OtpTimings {
                    initial_cooldown_secs: 0,
                    ..OtpTimings::from(&settings)
                },
            );
            otp.open(email).await;
            match otp.resend().await? {
                ResendOutcome::Resent { .. } => {
                    println!("OTP resent!");
                    Ok(())
                }
                ResendOutcome::Failed(message) => bail!(message),
                ResendOutcome::Stale => bail!("resend was superseded"),
            }
        }
        Command::Whoami { token } => {
            let mut session = AuthSession { token, user: None };
            let profile = session.refresh_profile(service.as_ref()).await?;
            println!("signed in as {}", profile.display_name());
            if let Some(gender) = profile.gender.as_deref() {
                println!("gender: {}", gender_label(gender).unwrap_or(gender));
            }
            Ok(())
        }
    }
}

fn onboard(service: Arc<dyn AuthService>, settings: &ClientSettings, skip: bool) -> Result<()> {
    let mut flow = AuthFlow::new(service, settings);
    if skip {
        flow.skip_onboarding();
    }
    while flow.screen() == Screen::Welcome {
        let carousel = flow.carousel();
        let slide = carousel.active_slide();
        println!(
            "[{}/{}] {}\n    {}\n    ({})",
            carousel.active_index() + 1,
            carousel.slides().len(),
            slide.title,
            slide.description,
            carousel.primary_label()
        );
        if let CarouselStep::Finished(_) = flow.next_slide() {
            break;
        }
    }
    println!("next: {:?}", flow.screen());
    Ok(())
}

/// Reads codes from stdin until verified. `r` resends, `q` closes the modal.
async fn prompt_for_code(flow: &mut AuthFlow) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let snapshot = flow.otp().snapshot().await;
        if snapshot.can_resend() {
            println!("Enter the code sent to {} (r = resend, q = quit):", snapshot.email_address);
        } else {
            println!(
                "Enter the code sent to {} (resend in {}s, q = quit):",
                snapshot.email_address, snapshot.cooldown_remaining
            );
        }

        let Some(line) = lines.next_line().await? else {
            flow.cancel_otp().await;
            bail!("input closed before verification");
        };
        match line.trim() {
            "q" => {
                flow.cancel_otp().await;
                bail!("verification cancelled");
            }
            "r" => match flow.resend_otp().await {
                Ok(ResendOutcome::Failed(message)) => eprintln!("{message}"),
                Ok(_) => {}
                Err(OtpError::CooldownActive { remaining }) => {
                    println!("resend available in {remaining}s");
                }
                Err(err) => println!("{err}"),
            },
            code => {
                flow.otp().set_code(code).await?;
                match flow.verify_otp().await? {
                    VerifyOutcome::Verified(session) => {
                        print_session(session.as_ref());
                        return Ok(());
                    }
                    VerifyOutcome::Rejected(message) => eprintln!("{message}"),
                    VerifyOutcome::Stale => {}
                }
            }
        }
    }
}

/// Prints progress; failures come back as outcomes and are reported by the caller.
fn spawn_event_printer(mut events: broadcast::Receiver<FlowEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(FlowEvent::Loading { label, active: true }) => println!("{label}"),
                Ok(FlowEvent::Notice(message)) => println!("{message}"),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_session(session: Option<&AuthSession>) {
    match session {
        Some(session) => {
            let name = session
                .display_name()
                .unwrap_or_else(|| "unknown user".to_string());
            println!("signed in as {name}");
            println!("token: {}", session.token);
        }
        None => println!("signed in"),
    }
}
