//! End-to-end render behavior against the in-memory collaborators.

use ccengine::test_utils::TestWorld;

#[tokio::test]
async fn literal_templates_pass_through_unchanged() {
    let world = TestWorld::new();
    let outcome = world.render_outcome("plain text, no expressions").await;
    assert!(outcome.success);
    assert_eq!(outcome.output.as_deref(), Some("plain text, no expressions"));
    assert!(!outcome.ephemeral);
}

#[tokio::test]
async fn context_paths_substitute_in_both_conventions() {
    let world = TestWorld::new();
    assert_eq!(world.render("Hello {{.User.Name}}!").await, "Hello alice!");
    assert_eq!(world.render("Hello {{.user.name}}!").await, "Hello alice!");
    assert_eq!(world.render("{{.Guild.Name}}/{{.Channel.Name}}").await, "testers/general");
}

#[tokio::test]
async fn side_effect_free_renders_are_deterministic() {
    let world = TestWorld::new();
    let template = r#"{{upper (concat .User.Name "-" .Guild.ID)}}"#;
    let first = world.render(template).await;
    let second = world.render(template).await;
    assert_eq!(first, "ALICE-900");
    assert_eq!(first, second);
}

#[tokio::test]
async fn variables_persist_across_expressions() {
    let world = TestWorld::new();
    assert_eq!(world.render("{{$x := 5}}{{$x}}").await, "5");
    assert_eq!(world.render("{{$n := add 2 3}}{{mult $n 10}}").await, "50");
    // Variable stores never leak between renders.
    assert_eq!(world.render("{{$x}}").await, "$x");
}

#[tokio::test]
async fn nested_calls_resolve_innermost_first() {
    let world = TestWorld::new();
    assert_eq!(world.render(r#"{{upper (lower "AbC")}}"#).await, "ABC");
    assert_eq!(
        world.render(r#"{{add (mult 2 (add 1 2)) 4}}"#).await,
        "10"
    );
}

#[tokio::test]
async fn snowflake_ids_survive_verbatim() {
    // 18-digit ids exceed f64's exact-integer range and must never be
    // coerced through a float.
    let id = "873286246197464551";
    let world = TestWorld::new();
    let out = world
        .render_with_args("{{arg 0}} {{.Args.0}}", vec![id.to_string()])
        .await;
    assert_eq!(out, format!("{id} {id}"));
}

#[tokio::test]
async fn quote_bearing_values_pass_through_nested_calls_whole() {
    let world = TestWorld::new();
    let out = world
        .render_with_args("{{upper (arg 0)}}", vec![r#"say "hi" now"#.to_string()])
        .await;
    assert_eq!(out, r#"SAY "HI" NOW"#);
}

#[tokio::test]
async fn unknown_functions_echo_the_expression() {
    let world = TestWorld::new();
    assert_eq!(
        world.render("{{notARealFunction 1 2}}").await,
        "notARealFunction 1 2"
    );
}

#[tokio::test]
async fn registry_outage_degrades_to_empty_text() {
    let world = TestWorld::new();
    world.registry.fail_all();
    let outcome = world.render_outcome(r#"motd: {{reg "motd"}}"#).await;
    assert!(outcome.success);
    assert_eq!(outcome.output.as_deref(), Some("motd: "));
}

#[tokio::test]
async fn ephemeral_marker_flips_the_outcome_flag() {
    let world = TestWorld::new();
    let outcome = world.render_outcome("{{ephemeral}}quiet reply").await;
    assert!(outcome.success);
    assert!(outcome.ephemeral);
    assert_eq!(outcome.output.as_deref(), Some("quiet reply"));
}

#[tokio::test]
async fn realistic_command_end_to_end() {
    let world = TestWorld::new();
    let out = world
        .render("Hello {{userMention .User.ID}}, you rolled {{randInt 1 6}}")
        .await;
    let pattern = regex::Regex::new(r"^Hello <@42>, you rolled [1-6]$").unwrap();
    assert!(pattern.is_match(&out), "got: {out}");
}

#[tokio::test]
async fn literals_around_expressions_splice_in_order() {
    let world = TestWorld::new();
    let out = world
        .render("a {{concat \"b\"}} c {{concat \"d\"}} e")
        .await;
    assert_eq!(out, "a b c d e");
}

#[tokio::test]
async fn registry_writes_are_visible_to_the_next_render() {
    let world = TestWorld::new();
    assert_eq!(world.render(r#"{{regSet "motd" "welcome"}}"#).await, "");
    assert_eq!(world.render(r#"{{reg "motd"}}"#).await, "welcome");
}
