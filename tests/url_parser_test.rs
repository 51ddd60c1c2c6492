//! Tests for URL/ID extraction functionality.

use gdrive_toolkit::url_parser::{could_be_raw_id, extract_id, looks_like_id};

mod extract_folder_url {
    use super::*;

    #[test]
    fn basic_folder_url() {
        let url = "https://drive.google.com/drive/folders/1abc123XYZ-_def456";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ-_def456");
    }

    #[test]
    fn folder_url_with_user() {
        let url = "https://drive.google.com/drive/u/0/folders/1abc123XYZ";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn folder_url_with_query_params() {
        let url = "http://drive.google.com/drive/folders/1abc123XYZ?usp=sharing";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }
}

mod extract_file_url {
    use super::*;

    #[test]
    fn file_url_with_view() {
        let url = "https://drive.google.com/file/d/1abc123XYZ/view?usp=sharing";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn file_url_without_suffix() {
        let url = "https://drive.google.com/file/d/1abc123XYZ";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn open_and_uc_urls() {
        assert_eq!(
            extract_id("https://drive.google.com/open?id=1abc123XYZ").unwrap(),
            "1abc123XYZ"
        );
        assert_eq!(
            extract_id("https://drive.google.com/uc?export=download&id=1abc123XYZ").unwrap(),
            "1abc123XYZ"
        );
    }

    #[test]
    fn docs_editor_urls() {
        for kind in ["document", "spreadsheets", "presentation", "forms"] {
            let url = format!("https://docs.google.com/{}/d/1abc123XYZ/edit#gid=0", kind);
            assert_eq!(extract_id(&url).unwrap(), "1abc123XYZ", "{}", kind);
        }
    }
}

mod extract_raw_id {
    use super::*;

    #[test]
    fn ids_with_underscore_and_hyphen() {
        assert_eq!(extract_id("abc-123_XYZ").unwrap(), "abc-123_XYZ");
    }

    #[test]
    fn root_alias() {
        assert_eq!(extract_id("root").unwrap(), "root");
    }

    #[test]
    fn id_with_whitespace_trimmed() {
        assert_eq!(extract_id("  1abc123XYZ  ").unwrap(), "1abc123XYZ");
        assert_eq!(extract_id("\t1abc123XYZ\n").unwrap(), "1abc123XYZ");
    }
}

mod invalid_inputs {
    use super::*;

    #[test]
    fn empty_or_whitespace() {
        assert!(extract_id("").is_err());
        assert!(extract_id("   ").is_err());
    }

    #[test]
    fn foreign_or_malformed_url() {
        assert!(extract_id("https://example.com/folder/123").is_err());
        assert!(extract_id("https://drive.google.com/drive/").is_err());
    }

    #[test]
    fn invalid_characters_in_id() {
        assert!(extract_id("abc 123").is_err());
        assert!(extract_id("abc/123").is_err());
        assert!(extract_id("abc@123").is_err());
    }
}

mod id_detection {
    use super::*;

    #[test]
    fn links_and_root_are_ids() {
        assert!(looks_like_id("https://drive.google.com/drive/folders/1abc"));
        assert!(looks_like_id("root"));
    }

    #[test]
    fn long_bare_strings_are_only_candidates() {
        assert!(!looks_like_id("1A2b3C4d5E6f7G8h9I0jKlMnOpQ"));
        assert!(could_be_raw_id("1A2b3C4d5E6f7G8h9I0jKlMnOpQ"));
        assert!(!looks_like_id("training_checkpoints_final"));
        assert!(could_be_raw_id("training_checkpoints_final"));
    }

    #[test]
    fn short_names_are_not_ids() {
        assert!(!looks_like_id("Reports"));
        assert!(!looks_like_id("my-backups"));
        assert!(!could_be_raw_id("my-backups"));
        assert!(!looks_like_id("https://example.com/x"));
    }
}
