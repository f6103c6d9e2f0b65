//! Common test utilities
//!
//! Shared fixtures for the integration tests: tracing setup, a live-browser
//! probe and fake versions of the sites the scenarios exercise.

#![allow(dead_code)]

use chaser_harness::session::{FakeDom, FakeElement, MockPage};
use chaser_harness::{init_tracing, Harness, HarnessConfig};
use std::sync::Arc;

pub const SAUCEDEMO_URL: &str = "https://www.saucedemo.com/";
pub const INVENTORY_URL: &str = "https://www.saucedemo.com/inventory.html";
pub const REGISTER_URL: &str = "https://material.playwrightvn.com/01-xpath-register-page.html";

pub const PRODUCTS: [&str; 3] = ["sauce-labs-backpack", "sauce-labs-bike-light", "sauce-labs-bolt-t-shirt"];

/// Login form that routes to `#/` on admin/admin and shows an alert otherwise
pub const LOCAL_LOGIN_HTML: &str = r#"<!DOCTYPE html>
<html><body>
<h2>Login</h2>
<form onsubmit="return submitLogin()">
  <input id="username" name="username">
  <input id="password" type="password">
  <button type="submit">Login</button>
</form>
<div class="alert-danger" style="display:none"></div>
<script>
function submitLogin() {
  var user = document.getElementById('username').value;
  var pass = document.getElementById('password').value;
  setTimeout(function () {
    if (user === 'admin' && pass === 'admin') {
      location.hash = '#/';
    } else {
      var alert = document.querySelector('.alert-danger');
      alert.textContent = 'Username or password is incorrect';
      alert.style.display = 'block';
    }
  }, 100);
  return false;
}
</script>
</body></html>"#;

/// `data:` URL serving `html`
pub fn data_url(html: &str) -> String {
    format!("data:text/html;charset=utf-8,{}", urlencoding::encode(html))
}

/// Install the test subscriber once per binary
pub fn setup_tracing() {
    init_tracing("info");
}

/// Harness for a live browser, or `None` when none is reachable
pub async fn live_harness() -> Option<Harness> {
    setup_tracing();
    let config = HarnessConfig::from_env().ok()?;
    let harness = Harness::new(config);
    if harness.is_available().await {
        Some(harness)
    } else {
        eprintln!("Skipping test: Chrome not available");
        None
    }
}

fn login_form() -> Vec<FakeElement> {
    vec![
        FakeElement::new("input").id("user-name").attr("data-test", "username"),
        FakeElement::new("input").id("password").attr("type", "password"),
        FakeElement::new("input").id("login-button").attr("type", "submit"),
    ]
}

fn inventory() -> Vec<FakeElement> {
    let mut elements = vec![
        FakeElement::new("div").class("inventory_list"),
        FakeElement::new("a").class("shopping_cart_link").id("cart-link"),
    ];
    for product in PRODUCTS {
        elements.push(FakeElement::new("button").id(format!("add-to-cart-{}", product)).text("Add to cart"));
    }
    elements
}

fn cart_size(dom: &FakeDom) -> usize {
    dom.elements().iter().filter(|e| e.element_id().map_or(false, |id| id.starts_with("remove-"))).count()
}

/// Show the badge with the cart size, or drop it when the cart is empty
fn render_badge(dom: &mut FakeDom) {
    dom.remove("cart-badge");
    let size = cart_size(dom);
    if size > 0 {
        dom.insert(
            FakeElement::new("span")
                .id("cart-badge")
                .class("shopping_cart_badge")
                .text(size.to_string())
                .child_of("cart-link"),
        );
    }
}

fn toggle_product(dom: &mut FakeDom, product: &str, add: bool) {
    let (from, to, label) = if add {
        ("add-to-cart-", "remove-", "Remove")
    } else {
        ("remove-", "add-to-cart-", "Add to cart")
    };
    dom.remove(&format!("{}{}", from, product));
    dom.insert(FakeElement::new("button").id(format!("{}{}", to, product)).text(label));
    render_badge(dom);
}

fn submit_login(dom: &mut FakeDom) {
    let user = dom.element("user-name").map(|e| e.value.clone()).unwrap_or_default();
    let secret = dom.element("password").map(|e| e.value.clone()).unwrap_or_default();
    if user == "standard_user" && secret == "secret_sauce" {
        let _ = dom.load(INVENTORY_URL);
    } else if dom.elements().iter().all(|e| e.attrs.get("data-test").map(String::as_str) != Some("error")) {
        dom.insert(
            FakeElement::new("h3")
                .attr("data-test", "error")
                .text("Epic sadface: Username and password do not match any user in this service"),
        );
    }
}

/// In-memory Swag Labs: login, inventory and a cart badge
pub fn fake_shop() -> Arc<MockPage> {
    let mut page = MockPage::new()
        .route(SAUCEDEMO_URL, login_form())
        .route(INVENTORY_URL, inventory())
        .on_click("login-button", submit_login);

    for product in PRODUCTS {
        page = page
            .on_click(format!("add-to-cart-{}", product), move |dom| toggle_product(dom, product, true))
            .on_click(format!("remove-{}", product), move |dom| toggle_product(dom, product, false));
    }
    Arc::new(page)
}

fn register_form() -> Vec<FakeElement> {
    vec![
        FakeElement::new("form").id("registrationForm"),
        FakeElement::new("input").id("username").attr("name", "username").child_of("registrationForm"),
        FakeElement::new("input").id("email").attr("type", "email").child_of("registrationForm"),
        FakeElement::new("input").id("male").attr("type", "radio").attr("name", "gender").child_of("registrationForm"),
        FakeElement::new("input").id("female").attr("type", "radio").attr("name", "gender").child_of("registrationForm"),
        FakeElement::new("input").id("reading").attr("type", "checkbox").child_of("registrationForm"),
        FakeElement::new("input").id("traveling").attr("type", "checkbox").child_of("registrationForm"),
        FakeElement::new("input").id("cooking").attr("type", "checkbox").child_of("registrationForm"),
        FakeElement::new("select")
            .id("interests")
            .multiple()
            .options(&["technology", "science", "art", "music", "sports"])
            .child_of("registrationForm"),
        FakeElement::new("select").id("country").options(&["usa", "canada", "uk"]).child_of("registrationForm"),
        FakeElement::new("input").id("dob").attr("type", "date").child_of("registrationForm"),
        FakeElement::new("button").id("register").attr("type", "submit").text("Register").child_of("registrationForm"),
        FakeElement::new("table").id("userTable"),
        FakeElement::new("tbody").id("userRows").child_of("userTable"),
    ]
}

fn submit_registration(dom: &mut FakeDom) {
    let field = |dom: &FakeDom, id: &str| dom.element(id).map(|e| e.value.clone()).unwrap_or_default();
    let username = field(dom, "username");
    let email = field(dom, "email");
    let row = format!("row-{}", dom.elements().len());

    dom.insert(FakeElement::new("tr").id(row.clone()).child_of("userRows"));
    dom.insert(FakeElement::new("td").text(username).child_of(row.clone()));
    dom.insert(FakeElement::new("td").text(email).child_of(row));
}

/// In-memory registration page that appends a table row per submit
pub fn fake_register_page() -> Arc<MockPage> {
    Arc::new(
        MockPage::new()
            .route(REGISTER_URL, register_form())
            .on_click("register", submit_registration),
    )
}
