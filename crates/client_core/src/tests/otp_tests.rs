use std::time::Duration;

use shared::protocol::{ApiResult, RESEND_OTP_PATH, VERIFY_OTP_PATH};

use super::*;
use crate::test_support::{login_result, RecordedCall, ScriptedAuthService};

const EMAIL: &str = "ada@example.com";

fn otp_session(service: &Arc<ScriptedAuthService>, timings: OtpTimings) -> Arc<OtpSession> {
    Arc::new(OtpSession::new(service.clone(), timings))
}

fn timings(initial: u32, resend: u32) -> OtpTimings {
    OtpTimings {
        initial_cooldown_secs: initial,
        resend_cooldown_secs: resend,
    }
}

async fn next_event(events: &mut broadcast::Receiver<OtpEvent>) -> OtpEvent {
    events.recv().await.expect("otp event")
}

async fn wait_for_cooldown(events: &mut broadcast::Receiver<OtpEvent>, target: u32) {
    loop {
        if next_event(events).await == OtpEvent::CooldownChanged(target) {
            return;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn open_starts_cooldown_and_ticks_every_second() {
    let service = ScriptedAuthService::new();
    let otp = otp_session(&service, OtpTimings::default());
    let mut events = otp.subscribe();

    otp.open(EMAIL).await;
    let snapshot = otp.snapshot().await;
    assert_eq!(snapshot.phase, OtpPhase::AwaitingCode);
    assert_eq!(snapshot.cooldown_remaining, 61);
    assert_eq!(snapshot.email_address, EMAIL);
    assert!(snapshot.code.is_empty());
    assert!(!snapshot.can_resend());

    assert_eq!(
        next_event(&mut events).await,
        OtpEvent::Opened {
            email_address: EMAIL.to_string()
        }
    );
    assert_eq!(next_event(&mut events).await, OtpEvent::CooldownChanged(60));
    assert_eq!(next_event(&mut events).await, OtpEvent::CooldownChanged(59));
    assert_eq!(otp.snapshot().await.cooldown_remaining, 59);
}

#[tokio::test(start_paused = true)]
async fn resend_is_refused_while_cooldown_runs() {
    let service = ScriptedAuthService::new();
    let otp = otp_session(&service, OtpTimings::default());
    otp.open(EMAIL).await;

    assert_eq!(
        otp.resend().await,
        Err(OtpError::CooldownActive { remaining: 61 })
    );
    assert!(service.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resend_after_cooldown_restarts_countdown_at_resend_value() {
    let service = ScriptedAuthService::new();
    let otp = otp_session(&service, timings(2, 100));
    let mut events = otp.subscribe();
    otp.open(EMAIL).await;

    wait_for_cooldown(&mut events, 0).await;
    assert!(otp.snapshot().await.can_resend());

    assert_eq!(
        otp.resend().await,
        Ok(ResendOutcome::Resent {
            cooldown_remaining: 100
        })
    );
    assert_eq!(
        service.calls(),
        vec![RecordedCall::ResendOtp(EMAIL.to_string())]
    );
    let snapshot = otp.snapshot().await;
    assert_eq!(snapshot.cooldown_remaining, 100);
    assert!(!snapshot.is_resending);

    assert_eq!(next_event(&mut events).await, OtpEvent::CooldownChanged(100));
    assert_eq!(next_event(&mut events).await, OtpEvent::CooldownChanged(99));
}

#[tokio::test(start_paused = true)]
async fn failed_resend_reports_message_and_keeps_cooldown_at_zero() {
    let service = ScriptedAuthService::new();
    service.script(RESEND_OTP_PATH, Ok(ApiResult::failure(400, "")));
    service.script(RESEND_OTP_PATH, Err("connection reset".to_string()));
    let otp = otp_session(&service, timings(0, 100));
    otp.open(EMAIL).await;

    assert_eq!(
        otp.resend().await,
        Ok(ResendOutcome::Failed("Failed to resend OTP".to_string()))
    );
    assert_eq!(
        otp.resend().await,
        Ok(ResendOutcome::Failed("Error resending OTP.".to_string()))
    );
    let snapshot = otp.snapshot().await;
    assert_eq!(snapshot.cooldown_remaining, 0);
    assert!(!snapshot.is_resending);
}

#[tokio::test(start_paused = true)]
async fn set_code_keeps_digits_only() {
    let service = ScriptedAuthService::new();
    let otp = otp_session(&service, OtpTimings::default());

    assert_eq!(otp.set_code("1234").await, Err(OtpError::NotAwaitingCode));

    otp.open(EMAIL).await;
    otp.set_code("12-34 56").await.expect("set code");
    assert_eq!(otp.snapshot().await.code, "123456");
}

#[tokio::test(start_paused = true)]
async fn successful_verify_yields_session_and_stops_ticker() {
    let service = ScriptedAuthService::new();
    service.script(VERIFY_OTP_PATH, Ok(login_result("jwt-token")));
    let otp = otp_session(&service, OtpTimings::default());
    let mut events = otp.subscribe();
    otp.open(EMAIL).await;
    otp.set_code("123456").await.expect("set code");

    let outcome = otp.verify().await.expect("verify");
    let VerifyOutcome::Verified(Some(session)) = outcome else {
        panic!("expected verified session, got {outcome:?}");
    };
    assert_eq!(session.token, "jwt-token");
    assert_eq!(
        service.calls(),
        vec![RecordedCall::VerifyOtp(VerifyOtpRequest {
            email_address: EMAIL.to_string(),
            otp: "123456".to_string(),
        })]
    );

    assert!(matches!(next_event(&mut events).await, OtpEvent::Opened { .. }));
    assert_eq!(next_event(&mut events).await, OtpEvent::Verified);

    time::sleep(Duration::from_secs(5)).await;
    let snapshot = otp.snapshot().await;
    assert_eq!(snapshot.phase, OtpPhase::Verified);
    assert_eq!(snapshot.cooldown_remaining, 61);
    assert_eq!(otp.verify().await, Err(OtpError::NotAwaitingCode));
}

#[tokio::test(start_paused = true)]
async fn rejected_verify_keeps_code_for_retry() {
    let service = ScriptedAuthService::new();
    service.script(VERIFY_OTP_PATH, Ok(ApiResult::failure(400, "OTP expired")));
    service.script(VERIFY_OTP_PATH, Ok(ApiResult::failure(400, "  ")));
    service.script(VERIFY_OTP_PATH, Err("connection refused".to_string()));
    let otp = otp_session(&service, OtpTimings::default());
    otp.open(EMAIL).await;
    otp.set_code("000000").await.expect("set code");

    assert_eq!(
        otp.verify().await,
        Ok(VerifyOutcome::Rejected("OTP expired".to_string()))
    );
    assert_eq!(
        otp.verify().await,
        Ok(VerifyOutcome::Rejected("Invalid OTP".to_string()))
    );
    assert_eq!(
        otp.verify().await,
        Ok(VerifyOutcome::Rejected("Verification failed.".to_string()))
    );

    let snapshot = otp.snapshot().await;
    assert_eq!(snapshot.phase, OtpPhase::AwaitingCode);
    assert_eq!(snapshot.code, "000000");
    assert!(!snapshot.is_verifying);
}

#[tokio::test(start_paused = true)]
async fn second_request_while_verifying_is_refused() {
    let service = ScriptedAuthService::gated();
    service.script(VERIFY_OTP_PATH, Ok(login_result("jwt-token")));
    let otp = otp_session(&service, timings(0, 100));
    otp.open(EMAIL).await;
    otp.set_code("123456").await.expect("set code");

    let pending = tokio::spawn({
        let otp = Arc::clone(&otp);
        async move { otp.verify().await }
    });
    service.wait_entered().await;

    assert!(otp.snapshot().await.is_verifying);
    assert_eq!(otp.verify().await, Err(OtpError::Busy));
    assert_eq!(otp.resend().await, Err(OtpError::Busy));

    service.release(1);
    let outcome = pending.await.expect("verify task").expect("verify");
    assert!(matches!(outcome, VerifyOutcome::Verified(Some(_))));
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn verify_is_refused_while_resending() {
    let service = ScriptedAuthService::gated();
    let otp = otp_session(&service, timings(0, 100));
    otp.open(EMAIL).await;

    let pending = tokio::spawn({
        let otp = Arc::clone(&otp);
        async move { otp.resend().await }
    });
    service.wait_entered().await;

    assert!(otp.snapshot().await.is_resending);
    assert_eq!(otp.verify().await, Err(OtpError::Busy));
    assert_eq!(otp.resend().await, Err(OtpError::Busy));

    service.release(1);
    assert_eq!(
        pending.await.expect("resend task"),
        Ok(ResendOutcome::Resent {
            cooldown_remaining: 100
        })
    );
}

#[tokio::test(start_paused = true)]
async fn abandoned_verify_does_not_leave_session_busy() {
    let service = ScriptedAuthService::gated();
    service.script(VERIFY_OTP_PATH, Ok(login_result("jwt-token")));
    let otp = otp_session(&service, timings(0, 100));
    otp.open(EMAIL).await;
    otp.set_code("123456").await.expect("set code");

    let abandoned = time::timeout(Duration::from_millis(10), otp.verify()).await;
    assert!(abandoned.is_err(), "gated verify should time out");

    let snapshot = otp.snapshot().await;
    assert_eq!(snapshot.phase, OtpPhase::AwaitingCode);
    assert!(!snapshot.is_verifying);
    assert_eq!(snapshot.code, "123456");

    service.release(1);
    let outcome = otp.verify().await.expect("next verify is accepted");
    assert!(matches!(outcome, VerifyOutcome::Verified(Some(_))));
    assert_eq!(service.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn abandoned_resend_does_not_leave_session_busy() {
    let service = ScriptedAuthService::gated();
    let otp = otp_session(&service, timings(0, 100));
    otp.open(EMAIL).await;

    let abandoned = time::timeout(Duration::from_millis(10), otp.resend()).await;
    assert!(abandoned.is_err(), "gated resend should time out");
    assert!(!otp.snapshot().await.is_resending);

    service.release(1);
    assert_eq!(
        otp.resend().await,
        Ok(ResendOutcome::Resent {
            cooldown_remaining: 100
        })
    );
}

#[tokio::test(start_paused = true)]
async fn verify_result_after_cancel_is_stale() {
    let service = ScriptedAuthService::gated();
    service.script(VERIFY_OTP_PATH, Ok(login_result("jwt-token")));
    let otp = otp_session(&service, OtpTimings::default());
    otp.open(EMAIL).await;
    otp.set_code("123456").await.expect("set code");

    let pending = tokio::spawn({
        let otp = Arc::clone(&otp);
        async move { otp.verify().await }
    });
    service.wait_entered().await;

    assert!(otp.cancel().await);
    service.release(1);

    assert_eq!(
        pending.await.expect("verify task"),
        Ok(VerifyOutcome::Stale)
    );
    let snapshot = otp.snapshot().await;
    assert_eq!(snapshot.phase, OtpPhase::Idle);
    assert!(snapshot.code.is_empty());
}

#[tokio::test(start_paused = true)]
async fn resend_result_after_reopen_is_stale() {
    let service = ScriptedAuthService::gated();
    let otp = otp_session(&service, timings(0, 100));
    otp.open(EMAIL).await;

    let pending = tokio::spawn({
        let otp = Arc::clone(&otp);
        async move { otp.resend().await }
    });
    service.wait_entered().await;

    otp.open("grace@example.com").await;
    service.release(1);

    assert_eq!(pending.await.expect("resend task"), Ok(ResendOutcome::Stale));
    let snapshot = otp.snapshot().await;
    assert_eq!(snapshot.email_address, "grace@example.com");
    assert_eq!(snapshot.cooldown_remaining, 0);
    assert!(!snapshot.is_resending);
}

#[tokio::test(start_paused = true)]
async fn cancel_hides_modal_and_stops_countdown() {
    let service = ScriptedAuthService::new();
    let otp = otp_session(&service, OtpTimings::default());
    let mut events = otp.subscribe();

    assert!(!otp.cancel().await);
    otp.open(EMAIL).await;
    otp.set_code("42").await.expect("set code");
    assert!(otp.cancel().await);

    assert!(matches!(next_event(&mut events).await, OtpEvent::Opened { .. }));
    assert_eq!(next_event(&mut events).await, OtpEvent::Closed);

    time::sleep(Duration::from_secs(5)).await;
    let snapshot = otp.snapshot().await;
    assert!(!snapshot.is_visible());
    assert_eq!(snapshot.cooldown_remaining, 0);
    assert!(snapshot.code.is_empty());
    assert!(events.try_recv().is_err());
    assert_eq!(otp.set_code("1").await, Err(OtpError::NotAwaitingCode));
    assert_eq!(otp.resend().await, Err(OtpError::NotAwaitingCode));
}

#[tokio::test(start_paused = true)]
async fn dropping_session_stops_the_ticker() {
    let service = ScriptedAuthService::new();
    let otp = OtpSession::new(service.clone(), OtpTimings::default());
    let mut events = otp.subscribe();
    otp.open(EMAIL).await;
    assert!(matches!(next_event(&mut events).await, OtpEvent::Opened { .. }));

    let state = Arc::downgrade(&otp.state);
    drop(otp);
    time::sleep(Duration::from_secs(3)).await;

    assert_eq!(state.strong_count(), 0);
    assert_eq!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Closed)
    );
}
