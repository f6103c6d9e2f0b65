//! Harness behaviour against in-memory versions of the demo sites
//!
//! Deterministic: no browser needed.

mod common;

use chaser_harness::locator::{resolve_by_attribute, resolve_by_id, resolve_css, resolve_text};
use chaser_harness::session::{FakeElement, MockPage, PageSession};
use chaser_harness::{
    authenticate, expect, expect_page, AuthConfig, Credentials, ElementReference, Error, UrlPattern,
};
use common::{fake_register_page, fake_shop, setup_tracing, INVENTORY_URL, PRODUCTS, REGISTER_URL, SAUCEDEMO_URL};
use std::sync::Arc;
use std::time::Duration;

fn auth_config() -> AuthConfig {
    AuthConfig::saucedemo().with_timeout(300)
}

async fn logged_in_shop() -> (Arc<MockPage>, Arc<dyn PageSession>) {
    let page = fake_shop();
    let session: Arc<dyn PageSession> = page.clone();
    authenticate(&session, &Credentials::new("standard_user", "secret_sauce"), &auth_config())
        .await
        .unwrap();
    (page, session)
}

#[tokio::test]
async fn test_existing_element_is_visible_after_resolve() {
    setup_tracing();
    let page = fake_shop();
    let session: Arc<dyn PageSession> = page.clone();
    session.goto(SAUCEDEMO_URL).await.unwrap();

    for id in ["user-name", "password", "login-button"] {
        let handle = resolve_by_id(&session, id);
        assert!(handle.is_visible().await.unwrap(), "{} should be visible", id);
        expect(&handle).to_be_visible().await.unwrap();
    }
}

#[tokio::test]
async fn test_late_element_becomes_visible_within_wait() {
    let page = Arc::new(MockPage::new());
    page.schedule(Duration::from_millis(50), |dom| {
        dom.insert(FakeElement::new("h2").id("heading").text("Register"));
    });
    let session: Arc<dyn PageSession> = page;

    let heading = resolve_by_id(&session, "heading");
    assert!(!heading.is_visible().await.unwrap());
    expect(&heading).to_be_visible().await.unwrap();
    expect(&heading).to_have_text("Register").await.unwrap();
}

#[tokio::test]
async fn test_accepted_credentials_transition_once() {
    let page = fake_shop();
    let session: Arc<dyn PageSession> = page.clone();

    authenticate(&session, &Credentials::new("standard_user", "secret_sauce"), &auth_config())
        .await
        .unwrap();

    expect_page(&session).to_have_url(INVENTORY_URL).await.unwrap();
    let navigations: Vec<String> = page.log().into_iter().filter(|e| e.starts_with("goto")).collect();
    assert_eq!(navigations, vec![format!("goto {}", SAUCEDEMO_URL)]);
    assert_eq!(page.log().iter().filter(|e| e.starts_with("click")).count(), 1);

    // Stays on the success location; no flicker back to the entry page
    tokio::time::sleep(Duration::from_millis(30)).await;
    expect_page(&session).not().to_have_url(SAUCEDEMO_URL).await.unwrap();
}

#[tokio::test]
async fn test_rejected_credentials_keep_entry_url() {
    let session: Arc<dyn PageSession> = fake_shop();

    let rejected = authenticate(&session, &Credentials::new("standard_user", "wrong"), &auth_config()).await;
    assert!(matches!(rejected, Err(Error::AuthenticationRejected { .. })));
    assert_eq!(session.current_url().await.unwrap(), SAUCEDEMO_URL);

    let without_failure_signal = AuthConfig {
        failure_signal: None,
        ..AuthConfig::saucedemo().with_timeout(80)
    };
    let timed_out = authenticate(&session, &Credentials::new("nobody", "nothing"), &without_failure_signal).await;
    assert!(matches!(timed_out, Err(Error::AuthenticationTimeout { .. })));
    assert_eq!(session.current_url().await.unwrap(), SAUCEDEMO_URL);
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let page = fake_shop();
    let session: Arc<dyn PageSession> = page.clone();
    session.goto(SAUCEDEMO_URL).await.unwrap();
    resolve_by_id(&session, "user-name").fill("standard_user").await.unwrap();
    let log_before = page.log();

    let a = resolve_by_attribute(&session, "data-test", "username");
    let b = resolve_by_attribute(&session, "data-test", "username");

    assert_eq!(a.is_visible().await.unwrap(), b.is_visible().await.unwrap());
    assert_eq!(a.input_value().await.unwrap(), b.input_value().await.unwrap());
    assert_eq!(a.count().await.unwrap(), b.count().await.unwrap());
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(page.log(), log_before);
}

#[tokio::test]
async fn test_cart_badge_tracks_adds_minus_removes() {
    for adds in 0..=PRODUCTS.len() {
        for removes in 0..=adds {
            let (_page, session) = logged_in_shop().await;
            let badge = resolve_css(&session, ".shopping_cart_badge");

            for product in &PRODUCTS[..adds] {
                resolve_by_id(&session, &format!("add-to-cart-{}", product)).click().await.unwrap();
            }
            for product in &PRODUCTS[..removes] {
                resolve_by_id(&session, &format!("remove-{}", product)).click().await.unwrap();
            }

            let expected = adds - removes;
            if expected == 0 {
                expect(&badge).not().to_be_visible().await.unwrap();
                assert_eq!(badge.count().await.unwrap(), 0);
            } else {
                expect(&badge).to_have_text(&expected.to_string()).await.unwrap();
                assert_eq!(badge.count().await.unwrap(), 1);
            }
        }
    }
}

#[tokio::test]
async fn test_registration_adds_table_row() {
    let page = fake_register_page();
    let session: Arc<dyn PageSession> = page.clone();
    session.goto(REGISTER_URL).await.unwrap();

    let username = Credentials::unique("testuser", "Password123").username().to_string();
    resolve_by_id(&session, "username").fill(&username).await.unwrap();
    resolve_by_id(&session, "email").fill("testuser@test.com").await.unwrap();

    let male = resolve_by_id(&session, "male");
    let female = resolve_by_id(&session, "female");
    female.check().await.unwrap();
    male.check().await.unwrap();
    expect(&male).to_be_checked().await.unwrap();
    expect(&female).not().to_be_checked().await.unwrap();

    let reading = resolve_by_id(&session, "reading");
    reading.check().await.unwrap();
    resolve_by_id(&session, "cooking").check().await.unwrap();
    reading.uncheck().await.unwrap();
    expect(&reading).not().to_be_checked().await.unwrap();
    expect(&resolve_by_id(&session, "cooking")).to_be_checked().await.unwrap();

    resolve_by_id(&session, "interests").select_options(&["music", "sports"]).await.unwrap();
    let country = resolve_by_id(&session, "country");
    country.select_option("canada").await.unwrap();
    expect(&country).to_have_value("canada").await.unwrap();

    let dob = resolve_by_id(&session, "dob");
    dob.fill("1995-12-25").await.unwrap();
    expect(&dob).to_have_value("1995-12-25").await.unwrap();

    resolve_css(&session, r#"button[type="submit"]"#).click().await.unwrap();

    let rows = resolve_css(&session, "table tbody");
    expect(&rows.within(ElementReference::text(&username))).to_be_visible().await.unwrap();
    expect(&rows.within(ElementReference::text("testuser@test.com"))).to_be_visible().await.unwrap();
    expect(&resolve_css(&session, "table tbody tr")).to_have_count(1).await.unwrap();
}

/// Registration either redirects away from the entry route or shows a
/// success alert in place, never both and never neither
async fn registration_outcome(redirects: bool) -> (bool, bool) {
    const ENTRY: &str = "https://www.globalsqa.com/angularJs-protractor/registration-login-example/#/register";
    const LOGIN: &str = "https://www.globalsqa.com/angularJs-protractor/registration-login-example/#/login";

    let page = Arc::new(
        MockPage::new()
            .route(
                ENTRY,
                vec![
                    FakeElement::new("h2").text("Register"),
                    FakeElement::new("input").id("firstName"),
                    FakeElement::new("input").id("Text1"),
                    FakeElement::new("input").id("username"),
                    FakeElement::new("input").id("password").attr("type", "password"),
                    FakeElement::new("button").id("register").attr("type", "submit").text("Register"),
                ],
            )
            .on_click("register", move |dom| {
                if redirects {
                    dom.set_url(LOGIN);
                } else {
                    dom.schedule(Duration::from_millis(20), |dom| {
                        dom.insert(FakeElement::new("div").class("alert").class("alert-success").text("Registration successful"));
                    });
                }
            }),
    );
    let session: Arc<dyn PageSession> = page;

    session.goto(ENTRY).await.unwrap();
    expect(&resolve_css(&session, "h2")).to_have_text("Register").await.unwrap();

    let credentials = Credentials::unique("testuser", "Password123!");
    resolve_by_id(&session, "firstName").fill("Cuong").await.unwrap();
    resolve_by_id(&session, "Text1").fill("Luong").await.unwrap();
    resolve_by_id(&session, "username").fill(credentials.username()).await.unwrap();
    resolve_by_id(&session, "password").fill(credentials.secret()).await.unwrap();
    resolve_css(&session, r#"button[type="submit"]"#).click().await.unwrap();

    let alert = resolve_css(&session, ".alert-success");
    let (probe_session, probe_alert) = (&session, &alert);
    let left_entry = chaser_harness::wait::wait_until(
        session.wait_options(),
        move || async move {
            let moved = !UrlPattern::exact(ENTRY).matches(&probe_session.current_url().await?);
            Ok::<_, Error>(moved || probe_alert.is_visible().await?)
        },
        |done| *done,
    )
    .await
    .unwrap();
    assert!(left_entry.is_satisfied());

    let redirected = !UrlPattern::exact(ENTRY).matches(&session.current_url().await.unwrap());
    let alert_shown = alert.is_visible().await.unwrap();
    (redirected, alert_shown)
}

#[tokio::test]
async fn test_registration_has_exactly_one_outcome() {
    for redirects in [true, false] {
        let (redirected, alert_shown) = registration_outcome(redirects).await;
        assert!(redirected ^ alert_shown, "redirected={} alert={}", redirected, alert_shown);
        assert_eq!(redirected, redirects);
    }
}

#[tokio::test]
async fn test_text_lookup_ignores_case() {
    let session: Arc<dyn PageSession> = Arc::new(MockPage::new().with_elements(vec![
        FakeElement::new("button").id("checkout").text("Checkout"),
    ]));
    resolve_text(&session, "CHECKOUT").click().await.unwrap();
}
