mod common;

use axum::http::StatusCode;
use serde_json::Value;

use spell_binder::models::{Color, Rarity};

use common::{unique_set_code, CardSpec, Factory, TestApp, TestAuth};

async fn search(app: &TestApp, auth: &TestAuth, query: &str) -> Vec<Value> {
    let response = app
        .server
        .get(&format!("/api/cards?{}", query))
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    body["items"].as_array().unwrap().clone()
}

fn names(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_search_requires_auth() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/cards").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_adding_a_filter_narrows_results() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    factory
        .create_card(CardSpec::new("Bolt Herald", &set).rarity(Rarity::Rare))
        .await;
    factory
        .create_card(CardSpec::new("Storm Caller", &set).rarity(Rarity::Rare))
        .await;
    factory.create_card(CardSpec::new("Shock Adept", &set)).await;

    let by_set = names(&search(&app, &auth, &format!("set_code={}", set)).await);
    let by_set_and_rarity =
        names(&search(&app, &auth, &format!("set_code={}&rarity=rare", set)).await);

    assert_eq!(by_set.len(), 3);
    assert_eq!(by_set_and_rarity.len(), 2);
    assert!(by_set_and_rarity.iter().all(|name| by_set.contains(name)));
    assert!(!by_set_and_rarity.contains(&"Shock Adept".to_string()));
}

#[tokio::test]
async fn test_type_line_filter_is_exact() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    factory
        .create_card(CardSpec::new("Grizzly Cub", &set).type_line("Creature"))
        .await;
    factory
        .create_card(CardSpec::new("Grizzly Ritual", &set).type_line("Sorcery"))
        .await;

    let items = search(&app, &auth, &format!("set_code={}&type_line=Sorcery", set)).await;

    assert_eq!(names(&items), vec!["Grizzly Ritual"]);
}

#[tokio::test]
async fn test_colors_match_any_listed_color() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    factory
        .create_card(CardSpec::new("A Blue", &set).colors(&[Color::Blue]))
        .await;
    factory
        .create_card(CardSpec::new("B Black", &set).colors(&[Color::Black]))
        .await;
    factory
        .create_card(CardSpec::new("C Dimir", &set).colors(&[Color::Blue, Color::Black]))
        .await;
    factory
        .create_card(CardSpec::new("D Red", &set).colors(&[Color::Red]))
        .await;
    factory.create_card(CardSpec::new("E Colorless", &set)).await;

    let items = search(&app, &auth, &format!("set_code={}&colors=U,B", set)).await;

    assert_eq!(names(&items), vec!["A Blue", "B Black", "C Dimir"]);
}

#[tokio::test]
async fn test_search_text_matches_name_or_exact_oracle_text() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    factory.create_card(CardSpec::new("Shock Trooper", &set)).await;
    factory
        .create_card(CardSpec::new("Zap", &set).oracle_text("Zap deals 1 damage to any target."))
        .await;

    let by_name = search(&app, &auth, &format!("set_code={}&searchText=Trooper", set)).await;
    assert_eq!(names(&by_name), vec!["Shock Trooper"]);

    let by_text = search(
        &app,
        &auth,
        &format!(
            "set_code={}&searchText=Zap%20deals%201%20damage%20to%20any%20target.",
            set
        ),
    )
    .await;
    assert_eq!(names(&by_text), vec!["Zap"]);
    assert_eq!(
        by_text[0]["oracle_text"].as_str(),
        Some("Zap deals 1 damage to any target.")
    );

    let partial_text = search(&app, &auth, &format!("set_code={}&searchText=deals%201", set)).await;
    assert!(partial_text.is_empty());
}

#[tokio::test]
async fn test_search_text_wildcards_are_literal() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    factory.create_card(CardSpec::new("Opt", &set)).await;

    let items = search(&app, &auth, &format!("set_code={}&searchText=%25", set)).await;

    assert!(items.is_empty());
}

#[tokio::test]
async fn test_pagination_and_rank_order() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    for rank in 1..=25 {
        let name = format!("Card {:02}", rank);
        factory
            .create_card(CardSpec::new(&name, &set).rank(rank))
            .await;
    }

    let page_two = search(&app, &auth, &format!("set_code={}&page=2&pageSize=10", set)).await;
    let expected: Vec<String> = (11..=20).map(|rank| format!("Card {:02}", rank)).collect();
    assert_eq!(names(&page_two), expected);

    let last_page = search(&app, &auth, &format!("set_code={}&page=3&pageSize=10", set)).await;
    assert_eq!(last_page.len(), 5);

    let past_end = search(&app, &auth, &format!("set_code={}&page=4&pageSize=10", set)).await;
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn test_unranked_cards_sort_last_by_name() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    factory.create_card(CardSpec::new("Beta", &set)).await;
    factory.create_card(CardSpec::new("Alpha", &set)).await;
    factory
        .create_card(CardSpec::new("Zeta", &set).rank(500))
        .await;

    let items = search(&app, &auth, &format!("set_code={}", set)).await;

    assert_eq!(names(&items), vec!["Zeta", "Alpha", "Beta"]);
}

#[tokio::test]
async fn test_default_page_size_is_ten() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    for i in 0..12 {
        let name = format!("Filler {:02}", i);
        factory.create_card(CardSpec::new(&name, &set)).await;
    }

    let items = search(&app, &auth, &format!("set_code={}", set)).await;

    assert_eq!(items.len(), 10);
}

#[tokio::test]
async fn test_invalid_parameters_are_rejected() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;

    for query in [
        "page=0",
        "page=abc",
        "pageSize=0",
        "pageSize=-5",
        "pageSize=101",
        "rarity=legendary",
        "colors=U,X",
    ] {
        let response = app
            .server
            .get(&format!("/api/cards?{}", query))
            .add_header("Authorization", auth.auth_header())
            .await;

        assert_eq!(
            response.status_code(),
            StatusCode::BAD_REQUEST,
            "query {} should be rejected",
            query
        );
    }
}

#[tokio::test]
async fn test_get_card_and_prices() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();
    let card = factory.create_card(CardSpec::new("Llanowar Elves", &set)).await;

    let response = app
        .server
        .get(&format!("/api/cards/{}", card.id))
        .add_header("Authorization", auth.auth_header())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"].as_str().unwrap(), "Llanowar Elves");
    assert_eq!(body["set_code"].as_str().unwrap(), set);

    let response = app
        .server
        .get(&format!("/api/cards/{}/prices", card.id))
        .add_header("Authorization", auth.auth_header())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_missing_card() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;

    let response = app
        .server
        .get(&format!("/api/cards/{}", uuid::Uuid::new_v4()))
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oracle_shadow_table_holds_only_searched_columns() {
    let app = TestApp::new().await;

    let columns: Vec<(String,)> = sqlx::query_as(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_name = 'oracle_texts' ORDER BY ordinal_position",
    )
    .fetch_all(&app.state.pg_pool)
    .await
    .unwrap();

    let columns: Vec<String> = columns.into_iter().map(|(name,)| name).collect();
    assert_eq!(columns, vec!["oracle_id", "oracle_text"]);
}
