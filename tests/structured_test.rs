//! Ledger export and payroll declaration anonymization.

use anonymiseur::structured::{
    AgeBucket, DeclarationAnonymizer, LedgerAnonymizer, RunState, TransformCategory,
};
use anonymiseur::AccountMaskPolicy;
use anyhow::Result;
use chrono::NaiveDate;

mod common;
use common::*;

fn fixed_run() -> RunState {
    RunState::with_salt(b"integration".to_vec())
        .with_reference_date(NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date"))
}

fn column(text: &str, row: usize, name: &str) -> String {
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap_or_default().split('|').collect();
    let index = header.iter().position(|h| *h == name).expect("column present");
    let line = lines.nth(row).expect("row present");
    line.split('|').nth(index).unwrap_or_default().to_string()
}

fn declaration_value(text: &str, code: &str) -> String {
    text.lines()
        .find_map(|l| l.strip_prefix(&format!("{},", code)))
        .map(|v| v.trim_matches('\'').to_string())
        .unwrap_or_else(|| panic!("code {} not found", code))
}

mod ledger {
    use super::*;

    #[test]
    fn test_account_prefix_is_preserved() -> Result<()> {
        let out = LedgerAnonymizer::default().anonymize(LEDGER_EXPORT, &mut fixed_run())?;
        assert_eq!(column(&out.text, 0, "CompteNum"), "4011XXXXXX");
        assert_eq!(column(&out.text, 1, "CompteNum"), "4011XXXXXX");
        Ok(())
    }

    #[test]
    fn test_full_account_mask() -> Result<()> {
        let out = LedgerAnonymizer::new(AccountMaskPolicy::Full)
            .anonymize(LEDGER_EXPORT, &mut fixed_run())?;
        assert_eq!(column(&out.text, 0, "CompteNum"), "XXXXXXXXXX");
        Ok(())
    }

    #[test]
    fn test_auxiliary_labels_get_sequential_pseudonyms() -> Result<()> {
        let out = LedgerAnonymizer::default().anonymize(LEDGER_EXPORT, &mut fixed_run())?;
        assert_eq!(column(&out.text, 0, "CompAuxLib"), "Client001");
        assert_eq!(column(&out.text, 1, "CompAuxLib"), "Client002");
        assert_eq!(column(&out.text, 2, "CompAuxLib"), "Client001");
        // General account labels have their own counter
        assert_eq!(column(&out.text, 0, "CompteLib"), "Client001");
        assert_eq!(column(&out.text, 2, "CompteLib"), "Client001");
        Ok(())
    }

    #[test]
    fn test_sensitive_values_are_gone() -> Result<()> {
        let out = LedgerAnonymizer::default().anonymize(LEDGER_EXPORT, &mut fixed_run())?;
        assert_text_redacted(&out.text, &["DUPONT", "MARTIN", "FA2024-001", "VIR-0120"]);
        assert_eq!(column(&out.text, 0, "PieceRef"), "REF-00001");
        assert_eq!(column(&out.text, 0, "Credit"), "1200,00");
        assert_eq!(column(&out.text, 2, "JournalCode"), "BQ");
        Ok(())
    }

    #[test]
    fn test_second_pass_changes_nothing() -> Result<()> {
        let anonymizer = LedgerAnonymizer::default();
        let mut run = fixed_run();
        let first = anonymizer.anonymize(LEDGER_EXPORT, &mut run)?;
        let second = anonymizer.anonymize(&first.text, &mut run)?;
        assert_eq!(second.text, first.text);
        assert_eq!(second.fields_rewritten(), 0);
        Ok(())
    }

    #[test]
    fn test_tab_separated_export() -> Result<()> {
        let tsv = LEDGER_EXPORT.replace('|', "\t");
        let out = LedgerAnonymizer::default().anonymize(&tsv, &mut fixed_run())?;
        let first_row = out.text.lines().nth(1).unwrap_or_default();
        assert!(first_row.contains("\t4011XXXXXX\t"));
        assert!(!first_row.contains('|'));
        Ok(())
    }

    #[test]
    fn test_missing_columns_degrade() -> Result<()> {
        let partial = "CompteNum|Debit\n4011000123|10,00\n";
        let out = LedgerAnonymizer::default().anonymize(partial, &mut fixed_run())?;
        assert_eq!(out.text, "CompteNum|Debit\n4011XXXXXX|10,00\n");
        Ok(())
    }

    #[test]
    fn test_unrelated_table_is_rejected() {
        let err = LedgerAnonymizer::default()
            .anonymize("Nom|Prenom\nDupont|Jean\n", &mut fixed_run())
            .unwrap_err();
        assert_eq!(err.category(), anonymiseur::FailureCategory::Format);
    }
}

mod declaration {
    use super::*;

    #[test]
    fn test_nir_becomes_salted_digest() -> Result<()> {
        let out = DeclarationAnonymizer::new().anonymize(DECLARATION, &mut fixed_run())?;
        let digest = declaration_value(&out.text, "S21.G00.30.001");
        assert_hex_digest(&digest, 12);
        assert!(!out.text.contains("185057800608491"));
        Ok(())
    }

    #[test]
    fn test_digest_is_stable_within_a_run() -> Result<()> {
        let anonymizer = DeclarationAnonymizer::new();
        let mut run = fixed_run();
        let first = anonymizer.anonymize(DECLARATION, &mut run)?;
        let again = anonymizer.anonymize(DECLARATION, &mut run)?;
        assert_eq!(
            declaration_value(&first.text, "S21.G00.30.001"),
            declaration_value(&again.text, "S21.G00.30.001")
        );

        let other = DECLARATION.replace("185057800608491", "295017500100127");
        let different = anonymizer.anonymize(&other, &mut run)?;
        assert_ne!(
            declaration_value(&first.text, "S21.G00.30.001"),
            declaration_value(&different.text, "S21.G00.30.001")
        );
        Ok(())
    }

    #[test]
    fn test_employee_fields() -> Result<()> {
        let out = DeclarationAnonymizer::new().anonymize(DECLARATION, &mut fixed_run())?;
        assert_eq!(declaration_value(&out.text, "S21.G00.30.002"), "SALARIE001");
        assert_eq!(declaration_value(&out.text, "S21.G00.30.004"), "SALARIE001");
        assert_eq!(
            declaration_value(&out.text, "S21.G00.30.006"),
            AgeBucket::From35To39.label()
        );
        assert_eq!(
            declaration_value(&out.text, "S21.G00.30.008"),
            "ADRESSE_MASQUEE"
        );
        assert_eq!(
            declaration_value(&out.text, "S21.G00.06.004"),
            "ADRESSE_MASQUEE"
        );
        Ok(())
    }

    #[test]
    fn test_sender_and_contact() -> Result<()> {
        let out = DeclarationAnonymizer::new().anonymize(DECLARATION, &mut fixed_run())?;
        assert_eq!(
            declaration_value(&out.text, "S10.G00.01.003"),
            "EMETTEUR_ANONYME"
        );
        assert_eq!(
            declaration_value(&out.text, "S10.G00.02.004"),
            "email@anonyme.fr"
        );
        assert_eq!(declaration_value(&out.text, "S10.G00.02.005"), "0000000000");
        assert_eq!(declaration_value(&out.text, "S21.G00.06.001"), "000000000");
        assert_eq!(
            declaration_value(&out.text, "S10.G00.00.001"),
            "Logiciel Paie"
        );
        assert_text_redacted(
            &out.text,
            &["DURAND", "paul.durand", "0478123456", "LILAS", "REPUBLIQUE"],
        );
        Ok(())
    }

    #[test]
    fn test_line_layout_is_kept() -> Result<()> {
        let out = DeclarationAnonymizer::new().anonymize(DECLARATION, &mut fixed_run())?;
        assert_eq!(out.text.lines().count(), DECLARATION.lines().count());
        for (before, after) in DECLARATION.lines().zip(out.text.lines()) {
            assert_eq!(before.split(',').next(), after.split(',').next());
            assert!(after.ends_with('\''));
        }
        Ok(())
    }

    #[test]
    fn test_second_pass_changes_nothing() -> Result<()> {
        let anonymizer = DeclarationAnonymizer::new();
        let mut run = fixed_run();
        let first = anonymizer.anonymize(DECLARATION, &mut run)?;
        let second = anonymizer.anonymize(&first.text, &mut run)?;
        assert_eq!(second.text, first.text);
        assert!(second
            .fields
            .iter()
            .all(|f| f.transform == TransformCategory::Passthrough));
        Ok(())
    }
}
