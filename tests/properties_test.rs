use email_normalize::*;
use proptest::prelude::*;

fn body_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z0-9 ,.]{0,70}", 0..15).prop_map(|lines| lines.join("\n"))
}

fn thread_of(bodies: &[String]) -> Thread {
    Thread {
        thread_id: "t".to_string(),
        subject: "Plan".to_string(),
        messages: bodies
            .iter()
            .enumerate()
            .map(|(i, body)| ParsedMessage {
                message_id: MessageId::new(format!("m{i}")),
                from_address: format!("user{i}@example.com"),
                body_text: Some(body.clone()),
                ..Default::default()
            })
            .collect(),
        warnings: Vec::new(),
    }
}

proptest! {
    #[test]
    fn normalize_body_is_deterministic(body in body_strategy()) {
        let options = ExtractOptions::default();
        prop_assert_eq!(normalize_body(&body, &options), normalize_body(&body, &options));
    }

    #[test]
    fn quote_removal_is_idempotent(body in body_strategy(), quoted in "[a-z ]{0,30}") {
        let input = format!("{body}\n> {quoted}");
        let once = strip_quoted_lines(&input);
        prop_assert_eq!(strip_quoted_lines(&once), once.clone());
        prop_assert!(!once.lines().any(|line| line.trim_start().starts_with('>')));
    }

    #[test]
    fn signature_content_is_a_prefix(body in body_strategy()) {
        let (content, _) = extract_signature(&body);
        prop_assert!(body.trim().starts_with(content.trim()));
    }

    #[test]
    fn truncation_respects_the_limit(
        bodies in prop::collection::vec("[a-z ]{0,300}", 1..6),
        max in 60usize..1500,
    ) {
        let mut thread = thread_of(&bodies);
        let output = extract_thread_content(
            &mut thread,
            &ExtractOptions::default().with_max_length(max),
        );

        let marker = truncation_marker(max);
        let notice = omitted_messages_notice(bodies.len(), bodies.len());
        let slack = marker.chars().count().max(notice.chars().count());

        prop_assert!(output.chars().count() <= max + slack);
        prop_assert!(output.matches(marker.trim_start()).count() <= 1);

        let truncated = output.contains("[... TRUNCATED");
        let warned = thread.warnings.iter().any(|w| w.starts_with("Content truncated"));
        prop_assert_eq!(truncated, warned);
    }

    #[test]
    fn numbering_follows_message_order(bodies in prop::collection::vec(body_strategy(), 1..8)) {
        let total = bodies.len();
        let mut thread = thread_of(&bodies);
        let output = extract_thread_content(&mut thread, &ExtractOptions::default());

        let positions: Vec<usize> = (1..=total)
            .map(|i| output.find(&format!("[{i}/{total}] From: user{}@example.com", i - 1)))
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default();

        prop_assert_eq!(positions.len(), total);
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn repeated_extraction_does_not_accumulate_warnings(
        bodies in prop::collection::vec("[a-z ]{0,40}", 1..5),
    ) {
        let mut thread = thread_of(&bodies);
        let options = ExtractOptions::default().with_max_length(80);

        let first = extract_thread_content(&mut thread, &options);
        let warnings = thread.warnings.clone();
        let second = extract_thread_content(&mut thread, &options);

        prop_assert_eq!(first, second);
        prop_assert_eq!(&thread.warnings, &warnings);
    }
}
