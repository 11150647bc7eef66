use chrono::Duration;
use chrono_tz::Tz;

use agenda_booking::domain::types::{
    CODE_ALPHABET, CODE_LEN, ExternalRefs, MAX_CODE_ATTEMPTS, SideEffect, SideEffectOutcome,
    SideEffectTarget,
};
use agenda_booking::error::BookingServiceError;
use agenda_booking::usecase::action_token::ValidateTokenUseCase;
use agenda_booking::usecase::booking::{
    AuthorizeMutationUseCase, CancelBookingUseCase, Caller, CreateBookingInput,
    CreateBookingUseCase, Credential, RescheduleBookingUseCase, RescheduleInput,
    SetStatusUseCase,
};
use agenda_booking::usecase::rate_limit::RateLimiter;
use agenda_domain::booking::{BookingStatus, TokenAction};
use agenda_domain::id::{BookingCode, ServiceId};

use crate::helpers::{
    MockBookingRepo, MockCalendar, MockCounters, MockMail, MockMeeting, MockMessageRepo,
    MockMessaging, MockServiceRepo, MockTokenRepo, TEST_IP, notifier, test_booking, test_now,
    test_service, test_token, utc,
};

type Authorizer = AuthorizeMutationUseCase<MockBookingRepo, MockTokenRepo, MockCounters, MockMail>;

fn authorizer(bookings: MockBookingRepo, tokens: MockTokenRepo) -> Authorizer {
    let counters = MockCounters::empty();
    AuthorizeMutationUseCase {
        bookings,
        limiter: RateLimiter {
            counters: counters.clone(),
        },
        validator: ValidateTokenUseCase {
            tokens,
            counters,
            mail: MockMail::unconfigured(),
            admin_email: None,
        },
    }
}

fn token_caller(token: &str) -> Caller {
    Caller {
        credential: Credential::Token(token.to_owned()),
        ip: TEST_IP.to_owned(),
    }
}

fn outcome(effects: &[SideEffect], target: SideEffectTarget) -> Option<SideEffectOutcome> {
    effects.iter().find(|e| e.target == target).map(|e| e.outcome)
}

fn create_input(start: &str) -> CreateBookingInput {
    CreateBookingInput {
        service_id: ServiceId(1),
        client_name: "  Ana Pérez ".to_owned(),
        client_email: "ana@example.com".to_owned(),
        client_phone: Some("+15550001".to_owned()),
        start: start.to_owned(),
        timezone: Some("UTC".to_owned()),
        notes: None,
        confirm: false,
        ip_address: Some(TEST_IP.to_owned()),
    }
}

struct CreateFixture {
    bookings: MockBookingRepo,
    tokens: MockTokenRepo,
    queue: MockMessageRepo,
    calendar: MockCalendar,
    meeting: MockMeeting,
}

impl CreateFixture {
    fn new() -> Self {
        Self {
            bookings: MockBookingRepo::empty(),
            tokens: MockTokenRepo::empty(),
            queue: MockMessageRepo::empty(),
            calendar: MockCalendar::unconfigured(),
            meeting: MockMeeting::unconfigured(),
        }
    }

    fn usecase(
        &self,
    ) -> CreateBookingUseCase<
        MockServiceRepo,
        MockBookingRepo,
        MockTokenRepo,
        MockMessageRepo,
        MockCalendar,
        MockMeeting,
        MockMessaging,
        MockMail,
    > {
        CreateBookingUseCase {
            services: MockServiceRepo::new(vec![test_service(1, 60, 0, 0)]),
            bookings: self.bookings.clone(),
            tokens: self.tokens.clone(),
            queue: self.queue.clone(),
            calendar: self.calendar.clone(),
            meeting: self.meeting.clone(),
            notifier: notifier(MockMessaging::unconfigured(), MockMail::unconfigured()),
            public_base_url: Some("https://book.example.com".to_owned()),
            auto_confirm: false,
            default_tz: Tz::UTC,
        }
    }
}

// ── Create ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_create_pending_booking_with_tokens_and_links() {
    let fx = CreateFixture::new();
    let stored = fx.bookings.bookings_handle();
    let tokens = fx.tokens.tokens_handle();

    let output = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await
        .unwrap();

    let booking = &output.booking;
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.client_name, "Ana Pérez");
    assert_eq!(booking.start_at, utc(2026, 3, 5, 10, 0));
    assert_eq!(booking.end_at, utc(2026, 3, 5, 11, 0));
    assert_eq!(booking.code.as_str().len(), CODE_LEN);
    assert!(
        booking
            .code
            .as_str()
            .bytes()
            .all(|b| CODE_ALPHABET.contains(&b))
    );
    assert_eq!(stored.lock().unwrap().len(), 1);

    let cancel = output.cancel_token.as_deref().unwrap();
    let reschedule = output.reschedule_token.as_deref().unwrap();
    assert_eq!(cancel.len(), 64);
    assert_ne!(cancel, reschedule);
    {
        let tokens = tokens.lock().unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| t.booking_id == booking.id));
        assert!(
            tokens
                .iter()
                .all(|t| t.expires_at == test_now() + Duration::hours(72))
        );
    }

    let links = output.links.unwrap();
    assert!(links.cancel.starts_with("https://book.example.com/"));
    assert!(links.cancel.contains(cancel));
    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::ActionTokens),
        Some(SideEffectOutcome::Applied)
    );
    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::Calendar),
        Some(SideEffectOutcome::Skipped)
    );
}

#[tokio::test]
async fn should_confirm_immediately_when_requested() {
    let fx = CreateFixture::new();
    let mut input = create_input("2026-03-05 10:00");
    input.confirm = true;

    let output = fx.usecase().execute(input, test_now()).await.unwrap();

    assert_eq!(output.booking.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn should_reject_overlapping_booking() {
    let fx = CreateFixture::new();
    fx.bookings.bookings_handle().lock().unwrap().push(test_booking(
        "TAKEN2345XYZ",
        utc(2026, 3, 5, 10, 30),
        BookingStatus::Confirmed,
    ));

    let result = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await;

    assert!(
        matches!(result, Err(BookingServiceError::SlotUnavailable)),
        "expected SlotUnavailable, got {result:?}"
    );
    assert_eq!(fx.bookings.bookings_handle().lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_reject_booking_overlapping_remote_commitment() {
    let mut fx = CreateFixture::new();
    fx.calendar = MockCalendar::with_busy(vec![crate::helpers::remote_busy(
        utc(2026, 3, 5, 9, 0),
        utc(2026, 3, 5, 10, 15),
    )]);

    let result = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await;

    assert!(matches!(result, Err(BookingServiceError::SlotUnavailable)));
}

#[tokio::test]
async fn should_accept_booking_touching_existing_one() {
    let fx = CreateFixture::new();
    fx.bookings.bookings_handle().lock().unwrap().push(test_booking(
        "BEFORE2345XY",
        utc(2026, 3, 5, 9, 0),
        BookingStatus::Confirmed,
    ));

    let result = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await;

    assert!(result.is_ok(), "back-to-back bookings must be allowed: {result:?}");
}

#[tokio::test]
async fn should_reject_invalid_create_input() {
    let fx = CreateFixture::new();

    let mut input = create_input("2026-03-05 10:00");
    input.client_email = "not-an-email".to_owned();
    assert!(matches!(
        fx.usecase().execute(input, test_now()).await,
        Err(BookingServiceError::MissingData)
    ));

    let mut input = create_input("2026-03-05 10:00");
    input.service_id = ServiceId(99);
    assert!(matches!(
        fx.usecase().execute(input, test_now()).await,
        Err(BookingServiceError::ServiceNotFound)
    ));

    assert!(matches!(
        fx.usecase()
            .execute(create_input("next tuesday"), test_now())
            .await,
        Err(BookingServiceError::InvalidDate)
    ));

    assert!(matches!(
        fx.usecase()
            .execute(create_input("2026-02-28 10:00"), test_now())
            .await,
        Err(BookingServiceError::PastDate)
    ));
}

#[tokio::test]
async fn should_keep_booking_when_token_issue_fails() {
    let mut fx = CreateFixture::new();
    fx.tokens = MockTokenRepo::failing();

    let output = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await
        .unwrap();

    assert!(output.cancel_token.is_none());
    assert!(output.reschedule_token.is_none());
    assert!(output.links.is_none());
    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::ActionTokens),
        Some(SideEffectOutcome::Failed)
    );
    assert_eq!(fx.bookings.bookings_handle().lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_retry_code_generation_after_collision() {
    let mut fx = CreateFixture::new();
    fx.bookings = MockBookingRepo::with_code_collisions(2);
    let checks = fx.bookings.code_checks_handle();

    let output = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await
        .unwrap();

    assert_eq!(*checks.lock().unwrap(), 3);
    assert_eq!(output.booking.code.as_str().len(), CODE_LEN);
    assert_eq!(fx.bookings.bookings_handle().lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_give_up_when_every_code_collides() {
    let mut fx = CreateFixture::new();
    fx.bookings = MockBookingRepo::with_code_collisions(MAX_CODE_ATTEMPTS);
    let checks = fx.bookings.code_checks_handle();

    let result = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await;

    assert!(matches!(result, Err(BookingServiceError::Internal(_))));
    assert_eq!(*checks.lock().unwrap(), MAX_CODE_ATTEMPTS);
    assert!(fx.bookings.bookings_handle().lock().unwrap().is_empty());
    assert!(fx.tokens.tokens_handle().lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_schedule_reminder_a_day_ahead() {
    let fx = CreateFixture::new();
    let queued = fx.queue.messages_handle();

    let output = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await
        .unwrap();

    let queued = queued.lock().unwrap();
    assert_eq!(queued.len(), 1);
    let reminder = &queued[0];
    assert_eq!(reminder.message_type, "reminder_24h");
    assert_eq!(reminder.recipient, "+15550001");
    assert_eq!(reminder.send_at, utc(2026, 3, 4, 10, 0));
    assert_eq!(reminder.booking_id, output.booking.id);
    assert_eq!(reminder.attempts, 0);
}

#[tokio::test]
async fn should_skip_reminder_when_start_is_within_a_day() {
    let fx = CreateFixture::new();
    let queued = fx.queue.messages_handle();

    let output = fx
        .usecase()
        .execute(create_input("2026-03-01 18:00"), test_now())
        .await
        .unwrap();

    assert!(queued.lock().unwrap().is_empty());
    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::Reminder),
        Some(SideEffectOutcome::Skipped)
    );
}

#[tokio::test]
async fn should_store_meeting_and_event_references() {
    let mut fx = CreateFixture::new();
    fx.calendar = MockCalendar::with_busy(vec![]);
    fx.meeting = MockMeeting::working();

    let output = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await
        .unwrap();

    let expected = ExternalRefs {
        calendar_event_id: Some("evt-1".to_owned()),
        meeting_id: Some("mtg-1".to_owned()),
        meeting_join_url: Some("https://meet.example.com/j/1".to_owned()),
    };
    assert_eq!(output.booking.refs, expected);
    assert_eq!(fx.bookings.bookings_handle().lock().unwrap()[0].refs, expected);
    assert_eq!(
        fx.meeting.calls_handle().lock().unwrap().as_slice(),
        ["create_meeting:60"]
    );
}

#[tokio::test]
async fn should_report_failed_meeting_without_failing_create() {
    let mut fx = CreateFixture::new();
    fx.meeting = MockMeeting::failing();

    let output = fx
        .usecase()
        .execute(create_input("2026-03-05 10:00"), test_now())
        .await
        .unwrap();

    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::Meeting),
        Some(SideEffectOutcome::Failed)
    );
    assert!(output.booking.refs.meeting_id.is_none());
}

// ── Authorize ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_require_token_for_anonymous_caller() {
    let booking = test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Confirmed);
    let uc = authorizer(MockBookingRepo::new(vec![booking]), MockTokenRepo::empty());

    let caller = Caller {
        credential: Credential::Anonymous,
        ip: TEST_IP.to_owned(),
    };
    let result = uc
        .execute(&caller, &BookingCode::from("ABCD2345WXYZ"), TokenAction::Cancel, test_now())
        .await;

    assert!(matches!(result, Err(BookingServiceError::MissingToken)));
}

#[tokio::test]
async fn should_let_admin_act_without_token() {
    let booking = test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Confirmed);
    let uc = authorizer(MockBookingRepo::new(vec![booking.clone()]), MockTokenRepo::empty());

    let caller = Caller {
        credential: Credential::Admin,
        ip: TEST_IP.to_owned(),
    };
    let found = uc
        .execute(&caller, &booking.code, TokenAction::Reschedule, test_now())
        .await
        .unwrap();

    assert_eq!(found.id, booking.id);
}

#[tokio::test]
async fn should_reject_token_bound_to_other_booking() {
    let mine = test_booking("MINE2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Confirmed);
    let other = test_booking("OTHR2345WXYZ", utc(2026, 3, 6, 10, 0), BookingStatus::Confirmed);
    let token = test_token(
        other.id,
        TokenAction::Cancel,
        &"c".repeat(64),
        test_now() + Duration::hours(72),
    );
    let uc = authorizer(
        MockBookingRepo::new(vec![mine.clone(), other]),
        MockTokenRepo::new(vec![token.clone()]),
    );

    let result = uc
        .execute(&token_caller(&token.token), &mine.code, TokenAction::Cancel, test_now())
        .await;

    assert!(
        matches!(result, Err(BookingServiceError::TokenMismatch)),
        "expected TokenMismatch, got {result:?}"
    );
}

// ── Cancel ───────────────────────────────────────────────────────────────────

fn cancel_usecase(
    bookings: MockBookingRepo,
    calendar: MockCalendar,
    meeting: MockMeeting,
) -> CancelBookingUseCase<MockBookingRepo, MockCalendar, MockMeeting, MockMessaging, MockMail> {
    CancelBookingUseCase {
        bookings,
        calendar,
        meeting,
        notifier: notifier(MockMessaging::working(), MockMail::working()),
    }
}

#[tokio::test]
async fn should_cancel_with_valid_token_only_once() {
    let mut booking =
        test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Confirmed);
    booking.refs.calendar_event_id = Some("evt-9".to_owned());
    booking.notes = "first visit".to_owned();
    let token = test_token(
        booking.id,
        TokenAction::Cancel,
        &"a".repeat(64),
        test_now() + Duration::hours(72),
    );
    let bookings = MockBookingRepo::new(vec![booking.clone()]);
    let stored = bookings.bookings_handle();
    let tokens = MockTokenRepo::new(vec![token.clone()]);
    let calendar = MockCalendar::with_busy(vec![]);
    let calendar_calls = calendar.calls_handle();

    let auth = authorizer(bookings.clone(), tokens.clone());
    let cancel = cancel_usecase(bookings, calendar, MockMeeting::working());
    let caller = token_caller(&token.token);

    let found = auth
        .execute(&caller, &booking.code, TokenAction::Cancel, test_now())
        .await
        .unwrap();
    let output = cancel
        .execute(found, Some(" feeling sick ".to_owned()), test_now())
        .await
        .unwrap();

    assert_eq!(output.booking.status, BookingStatus::Cancelled);
    assert_eq!(stored.lock().unwrap()[0].status, BookingStatus::Cancelled);
    assert_eq!(
        stored.lock().unwrap()[0].notes,
        "first visit\n[Cancelled] Reason: feeling sick"
    );
    assert_eq!(calendar_calls.lock().unwrap().as_slice(), ["delete_event:evt-9"]);
    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::Meeting),
        Some(SideEffectOutcome::Skipped)
    );
    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::Email),
        Some(SideEffectOutcome::Applied)
    );
    assert!(tokens.tokens_handle().lock().unwrap()[0].used);

    let replay = auth
        .execute(&caller, &booking.code, TokenAction::Cancel, test_now())
        .await;
    assert!(
        matches!(replay, Err(BookingServiceError::InvalidToken)),
        "expected InvalidToken on replay, got {replay:?}"
    );
}

#[tokio::test]
async fn should_refuse_cancelling_twice() {
    let booking = test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Cancelled);
    let uc = cancel_usecase(
        MockBookingRepo::new(vec![booking.clone()]),
        MockCalendar::unconfigured(),
        MockMeeting::unconfigured(),
    );

    let result = uc.execute(booking, None, test_now()).await;

    assert!(matches!(result, Err(BookingServiceError::AlreadyCancelled)));
}

#[tokio::test]
async fn should_refuse_cancelling_past_booking() {
    let booking = test_booking("ABCD2345WXYZ", utc(2026, 2, 27, 10, 0), BookingStatus::Confirmed);
    let uc = cancel_usecase(
        MockBookingRepo::new(vec![booking.clone()]),
        MockCalendar::unconfigured(),
        MockMeeting::unconfigured(),
    );

    let result = uc.execute(booking, None, test_now()).await;

    assert!(matches!(result, Err(BookingServiceError::PastBooking)));
}

#[tokio::test]
async fn should_keep_cancellation_when_side_effects_fail() {
    let mut booking =
        test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Confirmed);
    booking.refs.calendar_event_id = Some("evt-9".to_owned());
    booking.refs.meeting_id = Some("mtg-9".to_owned());
    let bookings = MockBookingRepo::new(vec![booking.clone()]);
    let stored = bookings.bookings_handle();
    let uc = CancelBookingUseCase {
        bookings,
        calendar: MockCalendar::failing(),
        meeting: MockMeeting::failing(),
        notifier: notifier(MockMessaging::failing(), MockMail::unconfigured()),
    };

    let output = uc.execute(booking, None, test_now()).await.unwrap();

    assert_eq!(stored.lock().unwrap()[0].status, BookingStatus::Cancelled);
    assert_eq!(stored.lock().unwrap()[0].notes, "[Cancelled]");
    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::Calendar),
        Some(SideEffectOutcome::Failed)
    );
    assert_eq!(
        outcome(&output.side_effects, SideEffectTarget::Whatsapp),
        Some(SideEffectOutcome::Failed)
    );
}

// ── Reschedule ───────────────────────────────────────────────────────────────

fn reschedule_usecase(
    bookings: MockBookingRepo,
    meeting: MockMeeting,
) -> RescheduleBookingUseCase<
    MockBookingRepo,
    MockServiceRepo,
    MockCalendar,
    MockMeeting,
    MockMessaging,
    MockMail,
> {
    RescheduleBookingUseCase {
        bookings,
        services: MockServiceRepo::new(vec![test_service(1, 90, 0, 0)]),
        calendar: MockCalendar::unconfigured(),
        meeting,
        notifier: notifier(MockMessaging::unconfigured(), MockMail::unconfigured()),
        default_tz: Tz::UTC,
    }
}

fn reschedule_to(new_start: &str) -> RescheduleInput {
    RescheduleInput {
        new_start: new_start.to_owned(),
        timezone: None,
    }
}

#[tokio::test]
async fn should_reschedule_confirmed_booking() {
    let mut booking =
        test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Confirmed);
    booking.refs.meeting_id = Some("mtg-9".to_owned());
    let bookings = MockBookingRepo::new(vec![booking.clone()]);
    let stored = bookings.bookings_handle();
    let meeting = MockMeeting::working();
    let meeting_calls = meeting.calls_handle();

    let output = reschedule_usecase(bookings, meeting)
        .execute(booking, reschedule_to("2026-03-06 15:00"), test_now())
        .await
        .unwrap();

    assert_eq!(output.booking.start_at, utc(2026, 3, 6, 15, 0));
    assert_eq!(output.booking.end_at, utc(2026, 3, 6, 16, 30));
    assert_eq!(output.booking.status, BookingStatus::Confirmed);
    let stored = stored.lock().unwrap();
    assert_eq!(stored[0].start_at, utc(2026, 3, 6, 15, 0));
    assert_eq!(stored[0].end_at, utc(2026, 3, 6, 16, 30));
    assert_eq!(meeting_calls.lock().unwrap().as_slice(), ["update_meeting:mtg-9"]);
}

#[tokio::test]
async fn should_reject_rescheduling_pending_booking() {
    let booking = test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Pending);
    let uc = reschedule_usecase(
        MockBookingRepo::new(vec![booking.clone()]),
        MockMeeting::unconfigured(),
    );

    let result = uc
        .execute(booking, reschedule_to("2026-03-06 15:00"), test_now())
        .await;

    assert!(matches!(result, Err(BookingServiceError::WrongState)));
}

#[tokio::test]
async fn should_reject_rescheduling_into_the_past() {
    let booking = test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Confirmed);
    let uc = reschedule_usecase(
        MockBookingRepo::new(vec![booking.clone()]),
        MockMeeting::unconfigured(),
    );

    let result = uc
        .execute(booking.clone(), reschedule_to("2026-02-20 15:00"), test_now())
        .await;
    assert!(matches!(result, Err(BookingServiceError::PastDate)));

    let result = uc.execute(booking, reschedule_to("  "), test_now()).await;
    assert!(matches!(result, Err(BookingServiceError::InvalidDate)));
}

// ── SetStatus ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_apply_only_allowed_status_transitions() {
    let booking = test_booking("ABCD2345WXYZ", utc(2026, 3, 5, 10, 0), BookingStatus::Pending);
    let bookings = MockBookingRepo::new(vec![booking.clone()]);
    let stored = bookings.bookings_handle();
    let uc = SetStatusUseCase { bookings };

    let updated = uc
        .execute(&booking.code, BookingStatus::Confirmed, test_now())
        .await
        .unwrap();
    assert_eq!(updated.status, BookingStatus::Confirmed);
    assert_eq!(stored.lock().unwrap()[0].status, BookingStatus::Confirmed);

    let result = uc
        .execute(&booking.code, BookingStatus::Pending, test_now())
        .await;
    assert!(matches!(result, Err(BookingServiceError::WrongState)));

    let result = uc
        .execute(&BookingCode::from("MISSING23456"), BookingStatus::Completed, test_now())
        .await;
    assert!(matches!(result, Err(BookingServiceError::BookingNotFound)));
}
