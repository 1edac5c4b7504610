//! End-to-end import and review flows against a DuckDB file
//!
//! Run with: cargo test --test integration_tests

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use ritualfin_core::adapters::DuckDbRepository;
use ritualfin_core::config::ImportSettings;
use ritualfin_core::domain::{AuditAction, AuditLogEntry, Budget, RawTransaction, Upload};
use ritualfin_core::ports::{Repository, TransactionFilter};
use ritualfin_core::services::{
    BudgetService, ImportService, PendingFilter, ReviewService, RuleService, SummaryService,
};
use ritualfin_core::{
    ConfirmationEdit, Error, FixVar, Identity, NewRule, Rule, RuleType, Transaction, UploadStatus,
};

const HEADER: &str = "Authorised on;Processed on;Amount;Currency;Description;Payment type;Status";

struct Harness {
    _dir: TempDir,
    repo: Arc<DuckDbRepository>,
    import: ImportService,
    budgets: BudgetService,
    review: ReviewService,
    rules: RuleService,
    summary: SummaryService,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(DuckDbRepository::new(&dir.path().join("ritualfin.duckdb")).unwrap());
    repo.ensure_schema().unwrap();
    Harness {
        import: ImportService::new(repo.clone(), ImportSettings::default()),
        budgets: BudgetService::new(repo.clone()),
        review: ReviewService::new(repo.clone()),
        rules: RuleService::new(repo.clone()),
        summary: SummaryService::new(repo.clone()),
        repo,
        _dir: dir,
    }
}

fn user(id: &str) -> Identity {
    Identity::new(id, Some(format!("{}@example.com", id)))
}

fn csv(rows: &[&str]) -> String {
    let mut text = format!("Miles & More Gold Credit Card;5310XXXXXXXX7340\n{}\n", HEADER);
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

fn rule(keywords: &str, category: &str) -> NewRule {
    NewRule {
        rule_type: RuleType::Expense,
        fix_var: FixVar::Variable,
        category_1: category.to_string(),
        category_2: None,
        keywords: keywords.to_string(),
    }
}

fn all_transactions(repo: &DuckDbRepository, profile: &str) -> Vec<Transaction> {
    repo.get_transactions(profile, &TransactionFilter::default()).unwrap()
}

/// Normalized descriptions carry payment type and status after the description
fn by_desc<'a>(transactions: &'a [Transaction], description: &str) -> &'a Transaction {
    transactions
        .iter()
        .find(|t| t.desc_norm.starts_with(&format!("{} --", description)))
        .unwrap_or_else(|| panic!("no transaction for {}", description))
}

// ============================================================================
// Import
// ============================================================================

#[test]
fn test_import_categorizes_and_flags() {
    let h = harness();
    let alice = user("alice");
    h.rules.create(&alice, rule("rewe", "Mercado")).unwrap();
    h.rules.create(&alice, rule("amazon; amzn", "Compras Online")).unwrap();
    h.rules.create(&alice, rule("marketplace", "Lazer")).unwrap();

    let text = csv(&[
        "05.02.2024;06.02.2024;-23,45;EUR;REWE Markt Berlin;Card;Processed",
        "07.02.2024;;-1.234,56;EUR;AMAZON Marketplace;Card;Authorised",
        "08.02.2024;;-9,99;EUR;Café Zürich;Card;Processed",
    ]);
    let summary = h.import.import(&alice, "feb.csv", &text).unwrap();

    assert_eq!(summary.status, UploadStatus::Ready);
    assert_eq!(summary.rows_total, 3);
    assert_eq!(summary.rows_imported, 3);
    assert_eq!(summary.rows_skipped, 0);
    assert_eq!(summary.needs_review, 2);

    let transactions = all_transactions(&h.repo, "alice");
    assert_eq!(transactions.len(), 3);

    let rewe = by_desc(&transactions, "rewe markt berlin");
    assert_eq!(rewe.category_1.as_deref(), Some("Mercado"));
    assert_eq!(rewe.amount, Decimal::new(-2345, 2));
    assert_eq!(rewe.payment_date, NaiveDate::from_ymd_opt(2024, 2, 5).unwrap());
    assert_eq!(rewe.account_source, "M&M");
    assert_eq!(rewe.upload_id, Some(summary.upload_id));
    assert!(!rewe.needs_review);
    assert!(rewe.rule_id_applied.is_some());

    let amazon = by_desc(&transactions, "amazon marketplace");
    assert_eq!(amazon.amount, Decimal::new(-123456, 2));
    assert_eq!(amazon.amount_display.as_deref(), Some("-1.234,56"));
    assert!(amazon.needs_review);
    assert!(amazon.rule_conflict);
    assert!(!amazon.rule_miss);
    assert!(amazon.category_1.is_none());

    let cafe = by_desc(&transactions, "cafe zurich");
    assert!(cafe.needs_review);
    assert!(cafe.rule_miss);
    assert!(!cafe.rule_conflict);

    let upload = h.import.get_upload(&alice, summary.upload_id).unwrap();
    assert_eq!(upload.status, UploadStatus::Ready);
    assert_eq!(upload.rows_imported, 3);
    assert!(upload.finished_at.is_some());
    assert_eq!(upload.checksum.as_deref().map(str::len), Some(64));

    let raw = h.import.raw_rows(&alice, summary.upload_id).unwrap();
    assert_eq!(raw.len(), 3);

    let audit = h.repo.get_audit_entries("alice").unwrap();
    assert!(audit.iter().any(|e| e.action == AuditAction::MmImport
        && e.payload["rows_imported"] == serde_json::json!(3)));
}

#[test]
fn test_bad_amount_fails_whole_batch() {
    let h = harness();
    let alice = user("alice");
    let text = format!(
        "{}\n{}\n{}\n{}\n",
        HEADER,
        "05.02.2024;;-10,00;EUR;REWE;Card;Processed",
        "06.02.2024;;abc;EUR;EDEKA;Card;Processed",
        "07.02.2024;;-3,00;EUR;LIDL;Card;Processed",
    );

    let err = h.import.import(&alice, "bad.csv", &text).unwrap_err();
    let upload_id = match &err {
        Error::RowValidation { upload_id, errors } => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("Line 3"), "{}", errors[0]);
            assert!(errors[0].contains("Amount"));
            *upload_id
        }
        other => panic!("expected RowValidation, got {:?}", other),
    };
    assert!(!err.is_pre_ingest());

    let upload = h.import.get_upload(&alice, upload_id).unwrap();
    assert_eq!(upload.status, UploadStatus::Error);
    assert_eq!(upload.rows_imported, 0);
    assert!(upload.error_message.unwrap().contains("Line 3"));

    assert!(all_transactions(&h.repo, "alice").is_empty());
    assert!(h.import.raw_rows(&alice, upload_id).unwrap().is_empty());
}

#[test]
fn test_stored_and_reported_errors_are_capped() {
    let h = harness();
    let alice = user("alice");
    let rows: Vec<String> = (0..12)
        .map(|i| format!("0{}.13.2024;;-1,00;EUR;SHOP {};Card;Processed", i % 9 + 1, i))
        .collect();
    let text = format!("{}\n{}\n", HEADER, rows.join("\n"));

    match h.import.import(&alice, "dates.csv", &text).unwrap_err() {
        Error::RowValidation { upload_id, errors } => {
            assert_eq!(errors.len(), 10);
            let upload = h.import.get_upload(&alice, upload_id).unwrap();
            let message = upload.error_message.unwrap();
            assert_eq!(message.matches("Line ").count(), 5);
        }
        other => panic!("expected RowValidation, got {:?}", other),
    }
}

#[test]
fn test_reimport_skips_stored_keys_but_keeps_raw_rows() {
    let h = harness();
    let alice = user("alice");
    let text = csv(&[
        "05.02.2024;;-10,00;EUR;REWE;Card;Processed",
        "06.02.2024;;-4,50;EUR;BAKERY;Card;Processed",
    ]);

    let first = h.import.import(&alice, "feb.csv", &text).unwrap();
    assert_eq!(first.rows_imported, 2);

    let second = h.import.import(&alice, "feb.csv", &text).unwrap();
    assert_eq!(second.status, UploadStatus::Duplicate);
    assert_eq!(second.rows_imported, 0);
    assert_eq!(second.rows_skipped, 2);

    assert_eq!(all_transactions(&h.repo, "alice").len(), 2);
    assert_eq!(h.import.raw_rows(&alice, second.upload_id).unwrap().len(), 2);

    let extended = csv(&[
        "05.02.2024;;-10,00;EUR;REWE;Card;Processed",
        "06.02.2024;;-4,50;EUR;BAKERY;Card;Processed",
        "09.02.2024;;-7,00;EUR;PHARMACY;Card;Processed",
    ]);
    let third = h.import.import(&alice, "feb-full.csv", &extended).unwrap();
    assert_eq!(third.status, UploadStatus::Ready);
    assert_eq!(third.rows_imported, 1);

    let uploads = h.import.list_uploads(&alice).unwrap();
    assert_eq!(uploads.len(), 3);
    assert_eq!(uploads[0].id, third.upload_id);
}

#[test]
fn test_identical_rows_in_one_batch_store_once() {
    let h = harness();
    let alice = user("alice");
    let text = csv(&[
        "05.02.2024;;-10,00;EUR;REWE;Card;Processed",
        "05.02.2024;;-10,00;EUR;REWE;Card;Processed",
    ]);
    let summary = h.import.import(&alice, "twice.csv", &text).unwrap();
    assert_eq!(summary.rows_imported, 1);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(h.import.raw_rows(&alice, summary.upload_id).unwrap().len(), 2);
}

#[test]
fn test_duplicate_suspects_in_batch_and_same_month() {
    let h = harness();
    let alice = user("alice");
    h.rules.create(&alice, rule("netflix; spotify", "Lazer")).unwrap();

    h.import
        .import(&alice, "jan.csv", &csv(&["15.01.2024;;-9,99;EUR;SPOTIFY;Card;Processed"]))
        .unwrap();

    let text = csv(&[
        "01.02.2024;;-12,99;EUR;NETFLIX;Card;Processed",
        "20.02.2024;;-12,99;EUR;Netflix;Card;Processed",
        "15.02.2024;;-9,99;EUR;SPOTIFY;Card;Processed",
    ]);
    h.import.import(&alice, "feb.csv", &text).unwrap();

    let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let transactions: Vec<Transaction> = all_transactions(&h.repo, "alice")
        .into_iter()
        .filter(|t| t.payment_date >= feb)
        .collect();
    assert_eq!(transactions.len(), 3);

    for tx in transactions.iter().filter(|t| t.desc_norm.starts_with("netflix --")) {
        assert!(tx.duplicate_suspect);
        assert!(tx.needs_review);
        assert_eq!(tx.category_1.as_deref(), Some("Lazer"));
    }
    let spotify = by_desc(&transactions, "spotify");
    assert!(!spotify.duplicate_suspect);
    assert!(!spotify.needs_review);
}

#[test]
fn test_internal_transfer_category_leaves_budget() {
    let h = harness();
    let alice = user("alice");
    h.rules.create(&alice, rule("ausgleich", "Interno")).unwrap();

    h.import
        .import(
            &alice,
            "feb.csv",
            &csv(&["10.02.2024;;500,00;EUR;Lastschrift Ausgleich;Transfer;Processed"]),
        )
        .unwrap();

    let tx = &all_transactions(&h.repo, "alice")[0];
    assert_eq!(tx.category_1.as_deref(), Some("Interno"));
    assert!(tx.internal_transfer);
    assert!(tx.exclude_from_budget);
    assert!(!tx.needs_review);
}

// ============================================================================
// Pre-ingest failures
// ============================================================================

#[test]
fn test_missing_column_creates_no_upload() {
    let h = harness();
    let alice = user("alice");
    let text = "Authorised on;Processed on;Currency;Description;Payment type;Status\n\
                05.02.2024;;EUR;REWE;Card;Processed\n";

    let err = h.import.import(&alice, "noamount.csv", text).unwrap_err();
    assert!(err.is_pre_ingest());
    match err {
        Error::InvalidHeader { missing, .. } => assert_eq!(missing, vec!["Amount".to_string()]),
        other => panic!("expected InvalidHeader, got {:?}", other),
    }
    assert!(h.import.list_uploads(&alice).unwrap().is_empty());
}

#[test]
fn test_empty_and_header_only_files() {
    let h = harness();
    let alice = user("alice");
    assert!(matches!(h.import.import(&alice, "e.csv", ""), Err(Error::EmptyInput)));
    assert!(matches!(
        h.import.import(&alice, "h.csv", &format!("{}\n", HEADER)),
        Err(Error::EmptyInput)
    ));
    assert!(h.import.list_uploads(&alice).unwrap().is_empty());
}

#[test]
fn test_non_utf8_file_is_rejected_before_upload() {
    let h = harness();
    let alice = user("alice");
    let mut bytes = csv(&[]).into_bytes();
    bytes.extend_from_slice(b"05.02.2024;;-10,00;EUR;CAF");
    let offset = bytes.len();
    bytes.extend_from_slice(b"\xc9;Card;Processed\n");

    let err = h.import.import_bytes(&alice, "latin1.csv", &bytes).unwrap_err();
    assert!(err.is_pre_ingest());
    assert_eq!(err.kind(), "invalid_encoding");
    assert!(matches!(err, Error::InvalidEncoding { offset: at } if at == offset));
    assert!(h.import.list_uploads(&alice).unwrap().is_empty());
    assert!(all_transactions(&h.repo, "alice").is_empty());
}

// ============================================================================
// Quoting
// ============================================================================

#[test]
fn test_quotes_inside_description_keep_columns_aligned() {
    let h = harness();
    let alice = user("alice");
    let text = csv(&[
        r#"05.02.2024;;-10,00;EUR;Shop "A;B" X;Card;Processed"#,
        r#"06.02.2024;;-800,00;EUR; "Rent; Feb";Transfer;Authorised"#,
    ]);

    let summary = h.import.import(&alice, "quotes.csv", &text).unwrap();
    assert_eq!(summary.rows_imported, 2);

    let raw = h.import.raw_rows(&alice, summary.upload_id).unwrap();
    let shop = raw.iter().find(|r| r.amount == "-10,00").unwrap();
    assert_eq!(shop.description, "Shop A;B X");
    assert_eq!(shop.payment_type, "Card");
    assert_eq!(shop.status, "Processed");

    let rent = raw.iter().find(|r| r.amount == "-800,00").unwrap();
    assert_eq!(rent.description, " Rent; Feb");
    assert_eq!(rent.payment_type, "Transfer");
    assert_eq!(rent.status, "Authorised");

    let transactions = all_transactions(&h.repo, "alice");
    assert_eq!(by_desc(&transactions, "shop a;b x").status.as_deref(), Some("Processed"));
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn test_profiles_do_not_see_each_other() {
    let h = harness();
    let alice = user("alice");
    let bob = user("bob");
    h.rules.create(&alice, rule("rewe", "Mercado")).unwrap();

    let text = csv(&["05.02.2024;;-10,00;EUR;REWE;Card;Processed"]);
    let from_alice = h.import.import(&alice, "a.csv", &text).unwrap();
    let from_bob = h.import.import(&bob, "b.csv", &text).unwrap();

    // same key, different owner: stored twice
    assert_eq!(from_bob.rows_imported, 1);

    let bobs = all_transactions(&h.repo, "bob");
    assert_eq!(bobs.len(), 1);
    assert!(bobs[0].rule_miss, "alice's rule must not apply to bob");
    assert!(!bobs[0].duplicate_suspect);

    assert!(matches!(
        h.import.get_upload(&bob, from_alice.upload_id),
        Err(Error::NotFound(_))
    ));
    assert!(h.rules.list(&bob).unwrap().is_empty());
    assert!(matches!(
        h.review.confirm(&bob, all_transactions(&h.repo, "alice")[0].id, &ConfirmationEdit::default()),
        Err(Error::NotFound(_))
    ));
}

// ============================================================================
// Review
// ============================================================================

#[test]
fn test_confirm_single_resolves_review() {
    let h = harness();
    let alice = user("alice");
    h.import
        .import(&alice, "feb.csv", &csv(&["08.02.2024;;-9,99;EUR;Café Zürich;Card;Processed"]))
        .unwrap();

    let pending = h.review.pending(&alice, &PendingFilter::default()).unwrap();
    assert_eq!(pending.len(), 1);

    let edit = ConfirmationEdit {
        tx_type: Some(RuleType::Expense),
        fix_var: Some(FixVar::Variable),
        category_1: Some("Lazer".to_string()),
        category_2: Some("Café".to_string()),
        exclude_from_budget: None,
    };
    let confirmed = h.review.confirm(&alice, pending[0].id, &edit).unwrap();
    assert!(confirmed.manual_override);
    assert!(!confirmed.needs_review);

    let stored = h.repo.get_transaction("alice", pending[0].id).unwrap().unwrap();
    assert_eq!(stored.category_1.as_deref(), Some("Lazer"));
    assert_eq!(stored.category_2.as_deref(), Some("Café"));
    assert!(!stored.rule_miss);
    assert!(h.review.pending(&alice, &PendingFilter::default()).unwrap().is_empty());

    let audit = h.repo.get_audit_entries("alice").unwrap();
    assert!(audit.iter().any(|e| e.action == AuditAction::ConfirmSingle));
}

#[test]
fn test_confirm_batch_with_rule() {
    let h = harness();
    let alice = user("alice");
    let text = csv(&[
        "03.02.2024;;-15,00;EUR;UBER TRIP 1;Card;Processed",
        "04.02.2024;;-18,00;EUR;UBER TRIP 2;Card;Processed",
        "04.03.2024;;-11,00;EUR;UBER TRIP 3;Card;Processed",
    ]);
    h.import.import(&alice, "trips.csv", &text).unwrap();

    let february = PendingFilter {
        month: Some("2024-02".to_string()),
        status: Some("Processed".to_string()),
    };
    let pending = h.review.pending(&alice, &february).unwrap();
    assert_eq!(pending.len(), 2);
    let ids: Vec<Uuid> = pending.iter().map(|t| t.id).collect();

    let edit = ConfirmationEdit {
        category_1: Some("Transporte".to_string()),
        ..Default::default()
    };
    let result = h.review.confirm_batch(&alice, &ids, &edit, Some("uber")).unwrap();
    assert_eq!(result.confirmed, 2);
    let rule_id = result.rule_id.unwrap();

    let rules: Vec<Rule> = h.rules.list(&alice).unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, rule_id);
    assert_eq!(rules[0].category_1, "Transporte");
    assert_eq!(rules[0].rule_type, RuleType::Expense);
    assert_eq!(rules[0].fix_var, FixVar::Variable);

    for id in &ids {
        let tx = h.repo.get_transaction("alice", *id).unwrap().unwrap();
        assert_eq!(tx.rule_id_applied.as_deref(), Some(rule_id.as_str()));
        assert_eq!(tx.category_1.as_deref(), Some("Transporte"));
        assert!(!tx.needs_review);
    }

    let remaining = h.review.pending(&alice, &PendingFilter::default()).unwrap();
    assert_eq!(remaining.len(), 1);

    let actions: Vec<AuditAction> = h
        .repo
        .get_audit_entries("alice")
        .unwrap()
        .iter()
        .map(|e| e.action)
        .collect();
    assert!(actions.contains(&AuditAction::RuleCreated));
    assert!(actions.contains(&AuditAction::ConfirmBatch));

    // the next import picks the rule up
    let next = csv(&["05.04.2024;;-9,00;EUR;Uber Trip 4;Card;Processed"]);
    let summary = h.import.import(&alice, "apr.csv", &next).unwrap();
    assert_eq!(summary.needs_review, 0);
}

#[test]
fn test_confirm_batch_rejects_unknown_ids_before_writing() {
    let h = harness();
    let alice = user("alice");
    h.import
        .import(&alice, "feb.csv", &csv(&["08.02.2024;;-9,99;EUR;KIOSK;Card;Processed"]))
        .unwrap();
    let known = all_transactions(&h.repo, "alice")[0].id;

    let err = h
        .review
        .confirm_batch(&alice, &[known, Uuid::new_v4()], &ConfirmationEdit::default(), Some("kiosk"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert!(h.repo.get_transaction("alice", known).unwrap().unwrap().needs_review);
    assert!(h.rules.list(&alice).unwrap().is_empty());

    assert!(matches!(
        h.review.confirm_batch(&alice, &[], &ConfirmationEdit::default(), None),
        Err(Error::Validation(_))
    ));
}

#[test]
fn test_confirm_into_internal_transfer() {
    let h = harness();
    let alice = user("alice");
    h.import
        .import(&alice, "feb.csv", &csv(&["10.02.2024;;300,00;EUR;TOP UP;Transfer;Processed"]))
        .unwrap();
    let id = all_transactions(&h.repo, "alice")[0].id;

    let edit = ConfirmationEdit {
        category_1: Some("Interno".to_string()),
        exclude_from_budget: Some(false),
        ..Default::default()
    };
    let tx = h.review.confirm(&alice, id, &edit).unwrap();
    assert!(tx.internal_transfer);
    assert!(tx.exclude_from_budget);
}

// ============================================================================
// Rules export and summary
// ============================================================================

#[test]
fn test_markdown_export() {
    let h = harness();
    let alice = user("alice");
    h.rules.create(&alice, rule("hotel", "Viagem")).unwrap();
    h.rules.create(&alice, rule("rewe; edeka", "Mercado")).unwrap();

    let md = h.rules.export_markdown(&alice).unwrap();
    assert!(md.starts_with("# RitualFin Categorization Rules (v1)"));
    assert!(md.contains("## Rules: Mercado"));
    assert!(md.find("## Rules: Mercado").unwrap() < md.find("## Rules: Viagem").unwrap());
    assert!(md.contains("| Despesa | Variável | Mercado |  | rewe; edeka |"));

    assert!(h.rules.export_markdown(&user("bob")).unwrap().contains("## Matching (v1)"));
}

#[test]
fn test_rule_validation() {
    let h = harness();
    let alice = user("alice");
    assert!(matches!(h.rules.create(&alice, rule(" ; ", "Lazer")), Err(Error::Validation(_))));
    assert!(matches!(h.rules.create(&alice, rule("x", "  ")), Err(Error::Validation(_))));
}

#[test]
fn test_month_summary() {
    let h = harness();
    let alice = user("alice");
    h.rules.create(&alice, rule("rewe", "Mercado")).unwrap();
    h.rules.create(&alice, rule("cinema", "Lazer")).unwrap();
    h.rules.create(&alice, rule("ausgleich", "Interno")).unwrap();
    h.rules
        .create(
            &alice,
            NewRule {
                rule_type: RuleType::Income,
                fix_var: FixVar::Fixed,
                category_1: "Receitas".to_string(),
                category_2: None,
                keywords: "gutschrift".to_string(),
            },
        )
        .unwrap();

    let text = csv(&[
        "05.02.2024;;-40,00;EUR;REWE;Card;Processed",
        "06.02.2024;;-12,50;EUR;CINEMA;Card;Processed",
        "07.02.2024;;-2,00;EUR;KIOSK;Card;Authorised",
        "08.02.2024;;100,00;EUR;GUTSCHRIFT;Transfer;Processed",
        "09.02.2024;;-500,00;EUR;AUSGLEICH;Transfer;Processed",
        "01.03.2024;;-99,00;EUR;REWE;Card;Processed",
    ]);
    h.import.import(&alice, "feb.csv", &text).unwrap();

    let summary = h.summary.month(&alice, "2024-02", None).unwrap();
    assert_eq!(summary.spent, Decimal::new(5250, 2));
    assert_eq!(summary.income, Decimal::from(100));
    assert_eq!(summary.needs_review, 1);
    assert_eq!(summary.transactions, 5);
    assert_eq!(summary.categories[0].category, "Mercado");
    assert_eq!(summary.categories[1].category, "Lazer");

    let processed = h.summary.month(&alice, "2024-02", Some("Processed")).unwrap();
    assert_eq!(processed.transactions, 4);
    assert_eq!(processed.needs_review, 0);

    assert!(matches!(h.summary.month(&alice, "02/2024", None), Err(Error::Validation(_))));
}

#[test]
fn test_budgets_and_projection_in_month_summary() {
    let h = harness();
    let alice = user("alice");
    h.rules.create(&alice, rule("rewe", "Mercado")).unwrap();
    h.rules
        .create(
            &alice,
            NewRule {
                rule_type: RuleType::Expense,
                fix_var: FixVar::Fixed,
                category_1: "Moradia".to_string(),
                category_2: None,
                keywords: "miete".to_string(),
            },
        )
        .unwrap();

    let text = csv(&[
        "02.02.2024;;-30,00;EUR;REWE;Card;Processed",
        "04.02.2024;;-10,00;EUR;REWE;Card;Processed",
        "25.02.2024;;-900,00;EUR;MIETE;Transfer;Processed",
    ]);
    h.import.import(&alice, "feb.csv", &text).unwrap();

    h.budgets.set(&alice, "2024-02", "Mercado", Decimal::from(100)).unwrap();
    let replaced = h.budgets.set(&alice, "2024-02", " Mercado ", Decimal::from(50)).unwrap();
    assert_eq!(replaced.amount, Decimal::from(50));
    h.budgets.set(&alice, "2024-02", "Moradia", Decimal::from(1000)).unwrap();
    h.budgets.set(&alice, "2024-03", "Mercado", Decimal::from(70)).unwrap();
    h.budgets.set(&user("bob"), "2024-02", "Lazer", Decimal::from(5)).unwrap();

    let today = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
    let summary = h.summary.month_as_of(&alice, "2024-02", None, today).unwrap();
    assert_eq!(summary.spent, Decimal::from(940));
    assert_eq!(summary.budget_total, Decimal::from(1050));
    assert_eq!(summary.remaining, Decimal::from(110));

    let mercado = summary.budgets.iter().find(|b| b.category == "Mercado").unwrap();
    assert_eq!(mercado.spent, Decimal::from(40));
    assert_eq!(mercado.remaining, Decimal::from(10));

    let projection = &summary.projection;
    assert_eq!(projection.fixed_remaining, Decimal::from(900));
    assert_eq!(projection.variable_run_rate, Decimal::from(4));
    assert_eq!(projection.days_remaining, 19);
    assert_eq!(projection.projected, Decimal::from(940 + 900 + 76));

    let march = h.budgets.list(&alice, "2024-03").unwrap();
    assert_eq!(march.len(), 1);
    h.budgets.remove(&alice, march[0].id).unwrap();
    assert!(h.budgets.list(&alice, "2024-03").unwrap().is_empty());
    assert!(matches!(h.budgets.remove(&alice, march[0].id), Err(Error::NotFound(_))));
}

#[test]
fn test_budget_validation() {
    let h = harness();
    let alice = user("alice");
    assert!(matches!(
        h.budgets.set(&alice, "2024-13", "Mercado", Decimal::from(10)),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.budgets.set(&alice, "2024-02", "  ", Decimal::from(10)),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.budgets.set(&alice, "2024-02", "Mercado", Decimal::from(-1)),
        Err(Error::Validation(_))
    ));
}

// ============================================================================
// Storage failures
// ============================================================================

#[derive(Clone, Copy, PartialEq)]
enum FailAt {
    RawStore,
    Transactions,
}

/// Delegates to DuckDB but fails one of the two ingest commits
struct FailingStore {
    inner: Arc<DuckDbRepository>,
    fail_at: FailAt,
}

impl Repository for FailingStore {
    fn insert_upload(&self, upload: &Upload) -> ritualfin_core::Result<()> {
        self.inner.insert_upload(upload)
    }
    fn update_upload(&self, upload: &Upload) -> ritualfin_core::Result<()> {
        self.inner.update_upload(upload)
    }
    fn get_upload(&self, profile_id: &str, id: Uuid) -> ritualfin_core::Result<Option<Upload>> {
        self.inner.get_upload(profile_id, id)
    }
    fn list_uploads(&self, profile_id: &str) -> ritualfin_core::Result<Vec<Upload>> {
        self.inner.list_uploads(profile_id)
    }
    fn insert_raw_transactions(&self, rows: &[RawTransaction]) -> ritualfin_core::Result<usize> {
        if self.fail_at == FailAt::RawStore {
            return Err(Error::persistence("raw store unavailable"));
        }
        self.inner.insert_raw_transactions(rows)
    }
    fn get_raw_transactions(
        &self,
        profile_id: &str,
        upload_id: Uuid,
    ) -> ritualfin_core::Result<Vec<RawTransaction>> {
        self.inner.get_raw_transactions(profile_id, upload_id)
    }
    fn get_rules(&self, profile_id: &str) -> ritualfin_core::Result<Vec<Rule>> {
        self.inner.get_rules(profile_id)
    }
    fn insert_rule(&self, rule: &Rule) -> ritualfin_core::Result<()> {
        self.inner.insert_rule(rule)
    }
    fn find_desc_norms_in_range(
        &self,
        profile_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        desc_norms: &[String],
    ) -> ritualfin_core::Result<HashSet<String>> {
        self.inner.find_desc_norms_in_range(profile_id, start, end, desc_norms)
    }
    fn find_existing_keys(
        &self,
        profile_id: &str,
        keys: &[String],
    ) -> ritualfin_core::Result<HashSet<String>> {
        self.inner.find_existing_keys(profile_id, keys)
    }
    fn insert_transactions(&self, transactions: &[Transaction]) -> ritualfin_core::Result<usize> {
        if self.fail_at == FailAt::Transactions {
            return Err(Error::persistence("disk full"));
        }
        self.inner.insert_transactions(transactions)
    }
    fn get_transactions(
        &self,
        profile_id: &str,
        filter: &TransactionFilter,
    ) -> ritualfin_core::Result<Vec<Transaction>> {
        self.inner.get_transactions(profile_id, filter)
    }
    fn get_transaction(&self, profile_id: &str, id: Uuid) -> ritualfin_core::Result<Option<Transaction>> {
        self.inner.get_transaction(profile_id, id)
    }
    fn update_transaction(&self, transaction: &Transaction) -> ritualfin_core::Result<()> {
        self.inner.update_transaction(transaction)
    }
    fn upsert_budget(&self, budget: &Budget) -> ritualfin_core::Result<()> {
        self.inner.upsert_budget(budget)
    }
    fn get_budgets(&self, profile_id: &str, month: NaiveDate) -> ritualfin_core::Result<Vec<Budget>> {
        self.inner.get_budgets(profile_id, month)
    }
    fn delete_budget(&self, profile_id: &str, id: Uuid) -> ritualfin_core::Result<bool> {
        self.inner.delete_budget(profile_id, id)
    }
    fn append_audit_entry(&self, entry: &AuditLogEntry) -> ritualfin_core::Result<()> {
        self.inner.append_audit_entry(entry)
    }
    fn get_audit_entries(&self, profile_id: &str) -> ritualfin_core::Result<Vec<AuditLogEntry>> {
        self.inner.get_audit_entries(profile_id)
    }
}

fn failing_import(h: &Harness, fail_at: FailAt) -> ImportService {
    ImportService::new(
        Arc::new(FailingStore {
            inner: h.repo.clone(),
            fail_at,
        }),
        ImportSettings::default(),
    )
}

#[test]
fn test_raw_store_failure_marks_upload_error() {
    let h = harness();
    let alice = user("alice");
    let failing = failing_import(&h, FailAt::RawStore);

    let text = csv(&["05.02.2024;;-10,00;EUR;REWE;Card;Processed"]);
    let err = failing.import(&alice, "feb.csv", &text).unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));
    assert!(!err.is_pre_ingest());

    let uploads = h.import.list_uploads(&alice).unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].status, UploadStatus::Error);
    assert_eq!(uploads[0].rows_imported, 0);
    assert!(uploads[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("raw store unavailable"));

    assert!(h.import.raw_rows(&alice, uploads[0].id).unwrap().is_empty());
    assert!(all_transactions(&h.repo, "alice").is_empty());
}

#[test]
fn test_transaction_insert_failure_keeps_raw_rows() {
    let h = harness();
    let alice = user("alice");
    let failing = failing_import(&h, FailAt::Transactions);

    let text = csv(&[
        "05.02.2024;;-10,00;EUR;REWE;Card;Processed",
        "06.02.2024;;-4,50;EUR;BAKERY;Card;Processed",
    ]);
    let err = failing.import(&alice, "feb.csv", &text).unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));
    assert_eq!(err.kind(), "persistence");

    let uploads = h.import.list_uploads(&alice).unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].status, UploadStatus::Error);
    assert!(uploads[0].error_message.as_deref().unwrap().contains("disk full"));

    assert_eq!(h.import.raw_rows(&alice, uploads[0].id).unwrap().len(), 2);
    assert!(all_transactions(&h.repo, "alice").is_empty());
}
