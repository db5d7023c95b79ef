use serde_json::json;
use tse_core::field::{
    INT32_MAX, clamp_i32, norm_enum, retarget_enum_like, set_bool, set_enum, set_int,
};
use tse_core::path::{Token, get, parse_dotted, set};
use tse_core::unwrap::{DEFAULT_MAX_DEPTH, unwrap_node, unwrap_with_path};

fn p(s: &str) -> Vec<Token> {
    parse_dotted(s)
}

#[test]
fn path_get_is_case_insensitive() {
    let tree = json!({"Root": {"Properties": {"QuestSaveData_0": 7}}});
    assert_eq!(
        get(&tree, &p("root.properties.questsavedata_0")),
        Some(&json!(7))
    );
    assert_eq!(get(&tree, &p("root.nope")), None);
}

#[test]
fn path_set_reuses_existing_key_casing() {
    let mut tree = json!({"Root": {"Count": 1}});
    assert!(set(&mut tree, &p("root.COUNT"), json!(2)));
    let map = tree["Root"].as_object().unwrap();
    assert_eq!(map.get("Count"), Some(&json!(2)));
    assert_eq!(map.len(), 1, "must not add a second key with new casing");
}

#[test]
fn path_set_creates_only_the_terminal_leaf() {
    let mut tree = json!({"root": {}});
    // terminal mapping exists: leaf key may be created
    assert!(set(&mut tree, &p("root.NewLeaf"), json!(5)));
    assert_eq!(get(&tree, &p("root.NewLeaf")), Some(&json!(5)));
    // missing intermediate: never auto-vivified
    assert!(!set(&mut tree, &p("root.missing.deeper"), json!(5)));
    assert_eq!(get(&tree, &p("root.missing")), None);
}

#[test]
fn path_set_never_resizes_sequences() {
    let mut tree = json!({"list": [1, 2, 3]});
    assert!(set(&mut tree, &p("list.1"), json!(9)));
    assert!(!set(&mut tree, &p("list.3"), json!(9)));
    assert_eq!(tree["list"].as_array().unwrap().len(), 3);
}

#[test]
fn path_type_mismatch_fails_whole_operation() {
    let mut tree = json!({"list": [1, 2]});
    // string token against a sequence
    assert_eq!(get(&tree, &p("list.first")), None);
    assert!(!set(&mut tree, &p("list.first"), json!(0)));
}

#[test]
fn unwrap_reaches_array_struct_value() {
    let node = json!({"Array": {"Struct": {"value": [1, 2]}}});
    assert_eq!(unwrap_node(&node, DEFAULT_MAX_DEPTH), &json!([1, 2]));

    let node = json!({"Array": {"value": [3]}});
    assert_eq!(unwrap_node(&node, DEFAULT_MAX_DEPTH), &json!([3]));
}

#[test]
fn unwrap_prefers_array_over_generic_wrappers() {
    // a Struct sibling must not shadow the Array payload
    let node = json!({
        "Struct": {"Struct": {"decoy": true}},
        "Array": {"value": [1, 2, 3]}
    });
    assert_eq!(unwrap_node(&node, DEFAULT_MAX_DEPTH), &json!([1, 2, 3]));
}

#[test]
fn unwrap_tracks_absolute_path() {
    let node = json!({"Struct": {"Struct": {"leaf": 1}}});
    let base = vec![Token::key("root"), Token::Index(4)];
    let (inner, path) = unwrap_with_path(&node, &base, DEFAULT_MAX_DEPTH);
    assert_eq!(inner, &json!({"leaf": 1}));
    assert_eq!(
        path,
        vec![
            Token::key("root"),
            Token::Index(4),
            Token::key("Struct"),
            Token::key("Struct"),
        ]
    );
}

#[test]
fn unwrap_stops_at_max_depth() {
    // pathological self-similar nesting must terminate
    let mut node = json!({"end": true});
    for _ in 0..40 {
        node = json!({"Struct": node});
    }
    let out = unwrap_node(&node, DEFAULT_MAX_DEPTH);
    assert!(out.is_object());
    assert!(out.get("end").is_none(), "must stop before the bottom");
}

#[test]
fn set_int_clamps_and_is_idempotent() {
    let mut node = json!({"tag": {"data": {"Other": "IntProperty"}}, "Int": 1})
        .as_object()
        .unwrap()
        .clone();
    assert!(set_int(&mut node, -5, true));
    assert_eq!(node["Int"], json!(0));
    assert!(set_int(&mut node, 1 << 40, true));
    assert_eq!(node["Int"], json!(INT32_MAX));
    // identical second call reports no change
    assert!(!set_int(&mut node, 1 << 40, true));
    assert_eq!(clamp_i32(123), 123);
}

#[test]
fn set_int_dry_run_counts_without_mutating() {
    let mut node = json!({"tag": {"data": {"Other": "IntProperty"}}, "Int": 1})
        .as_object()
        .unwrap()
        .clone();
    assert!(set_int(&mut node, 99, false));
    assert_eq!(node["Int"], json!(1));
    assert!(!set_int(&mut node, 1, false));
}

#[test]
fn set_int_prefers_existing_int64_slot() {
    let mut node = json!({"tag": {"data": {"Other": "Int64Property"}}, "Int64": 5})
        .as_object()
        .unwrap()
        .clone();
    assert!(set_int(&mut node, 10, true));
    assert_eq!(node["Int64"], json!(10));
    assert!(!node.contains_key("Int"));
    assert_eq!(node["tag"], json!({"data": {"Other": "Int64Property"}}));
}

#[test]
fn set_int_creates_int_slot_when_none() {
    let mut node = serde_json::Map::new();
    assert!(set_int(&mut node, 3, true));
    assert_eq!(node["Int"], json!(3));
    assert_eq!(node["tag"], json!({"data": {"Other": "IntProperty"}}));
}

#[test]
fn set_bool_only_counts_real_changes() {
    let mut node = json!({"tag": {"data": {"Other": "BoolProperty"}}, "Bool": false})
        .as_object()
        .unwrap()
        .clone();
    assert!(set_bool(&mut node, true, true));
    assert!(!set_bool(&mut node, true, true));
    assert_eq!(node["Bool"], json!(true));
}

#[test]
fn set_enum_synthesizes_namespace_once() {
    let mut node = serde_json::Map::new();
    assert!(set_enum(&mut node, "ELStargazerType", "E_ACTIVE_IDLE", true));
    assert_eq!(node["Enum"], json!("ELStargazerType::E_ACTIVE_IDLE"));
    assert_eq!(node["tag"], json!({"data": {"Enum": ["ELStargazerType", null]}}));
    // already-namespaced value passes through untouched
    assert!(!set_enum(&mut node, "ELStargazerType", "ELStargazerType::E_ACTIVE_IDLE", true));
    // exact string compare, no case folding
    assert!(set_enum(&mut node, "ELStargazerType", "e_active_idle", true));
    assert_eq!(node["Enum"], json!("ELStargazerType::e_active_idle"));
}

#[test]
fn norm_enum_folds_separators() {
    assert_eq!(norm_enum("  ELQuestState::E_In Progress "), "ELQUESTSTATE_E_IN_PROGRESS");
    assert_eq!(norm_enum("complete-success"), "COMPLETE_SUCCESS");
}

#[test]
fn retarget_preserves_prefix() {
    assert_eq!(
        retarget_enum_like("ELQUESTSTATE_E_IN_PROGRESS", "E_COMPLETE_SUCCESS"),
        "ELQUESTSTATE_E_COMPLETE_SUCCESS"
    );
    assert_eq!(retarget_enum_like("E_INACTIVE", "E_COMPLETE_FAIL"), "E_COMPLETE_FAIL");
}

#[test]
fn retarget_keeps_raw_namespace_convention() {
    assert_eq!(
        retarget_enum_like("ELQuestState::E_INACTIVE", "E_IN_PROGRESS"),
        "ELQuestState::E_IN_PROGRESS"
    );
    // no marker in the current value: canonical suffix alone
    assert_eq!(retarget_enum_like("", "E_COMPLETE_SUCCESS"), "E_COMPLETE_SUCCESS");
    assert_eq!(retarget_enum_like("Inactive", "E_IN_PROGRESS"), "E_IN_PROGRESS");
}

#[test]
fn retarget_is_stable_under_repetition() {
    let once = retarget_enum_like("ELQuestState::E_INACTIVE", "E_COMPLETE_SUCCESS");
    let twice = retarget_enum_like(&once, "E_COMPLETE_SUCCESS");
    assert_eq!(once, twice);
}

mod merge_rules {
    use serde_json::json;
    use tse_core::merge::merge;

    #[test]
    fn never_grows_keys() {
        let baseline = json!({"a": 1, "b": 2});
        let edited = json!({"a": 10, "invented": 99});
        let merged = merge(&baseline, &edited);
        assert_eq!(merged, json!({"a": 10, "b": 2}));
    }

    #[test]
    fn never_resizes_lists() {
        let baseline = json!([1, 2, 3]);
        assert_eq!(merge(&baseline, &json!([9])).as_array().unwrap().len(), 3);
        assert_eq!(
            merge(&baseline, &json!([9, 9, 9, 9, 9])).as_array().unwrap().len(),
            3
        );
        assert_eq!(merge(&baseline, &json!([9, 9, 9, 9])), json!([9, 9, 9]));
    }

    #[test]
    fn tagged_node_keeps_tag_verbatim() {
        let baseline = json!({"tag": "IntProperty", "value": 1});
        let edited = json!({"tag": "Corrupted", "value": 5});
        assert_eq!(merge(&baseline, &edited), json!({"tag": "IntProperty", "value": 5}));
    }

    #[test]
    fn scalar_type_mismatch_keeps_baseline() {
        let baseline = json!({"n": 3});
        let edited = json!({"n": "three"});
        assert_eq!(merge(&baseline, &edited), json!({"n": 3}));
    }

    #[test]
    fn null_baseline_accepts_edited() {
        let baseline = json!({"n": null});
        let edited = json!({"n": 42});
        assert_eq!(merge(&baseline, &edited), json!({"n": 42}));
    }

    #[test]
    fn container_mismatch_keeps_baseline() {
        let baseline = json!({"a": {"deep": true}});
        let edited = json!({"a": [1, 2]});
        assert_eq!(merge(&baseline, &edited), baseline);
    }

    #[test]
    fn deep_merge_through_property_wrappers() {
        let baseline = json!({
            "root": {"properties": {
                "Health_0": {"tag": {"data": {"Other": "IntProperty"}}, "Int": 100},
                "List_0": {"Array": {"Struct": {"value": [
                    {"Struct": {"Count_0": {"Int": 1}}},
                    {"Struct": {"Count_0": {"Int": 2}}},
                ]}}}
            }}
        });
        let mut edited = baseline.clone();
        edited["root"]["properties"]["Health_0"]["Int"] = json!(999);
        edited["root"]["properties"]["List_0"]["Array"]["Struct"]["value"][0]["Struct"]["Count_0"]
            ["Int"] = json!(7);
        let merged = merge(&baseline, &edited);
        assert_eq!(merged["root"]["properties"]["Health_0"]["Int"], json!(999));
        assert_eq!(
            merged["root"]["properties"]["Health_0"]["tag"],
            json!({"data": {"Other": "IntProperty"}})
        );
        assert_eq!(
            merged["root"]["properties"]["List_0"]["Array"]["Struct"]["value"][0]["Struct"]
                ["Count_0"]["Int"],
            json!(7)
        );
    }
}

mod codec_and_backup {
    use serde_json::json;
    use std::io::Write as _;

    #[cfg(unix)]
    fn fake_codec(dir: &std::path::Path, script: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let exe = dir.join("fake-codec");
        std::fs::write(&exe, script).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        exe
    }

    #[test]
    fn load_file_reads_json_without_codec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        std::fs::write(&path, r#"{"root": {"properties": {}}}"#).unwrap();
        let codec = tse_core::SaveCodec::new("definitely-not-a-real-codec");
        let tree = codec.load_file(&path).expect("json loads directly");
        assert!(tree["root"]["properties"].is_object());
    }

    #[test]
    fn load_file_extension_check_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.JSON");
        std::fs::write(&path, r#"{"root": {"properties": {}}}"#).unwrap();
        let codec = tse_core::SaveCodec::new("definitely-not-a-real-codec");
        let tree = codec.load_file(&path).expect("uppercase suffix is still a dump");
        assert!(tree["root"]["properties"].is_object());
    }

    #[cfg(unix)]
    #[test]
    fn encode_streams_payloads_larger_than_the_pipe_buffer() {
        let dir = tempfile::tempdir().unwrap();
        // echoes stdin to stdout while reading, like a streaming encoder
        let exe = fake_codec(dir.path(), "#!/bin/sh\nexec cat\n");

        // well past the pipe capacity in both directions
        let tree = json!({"root": {"properties": {"Blob_0": vec![7i64; 400_000]}}});
        let codec = tse_core::SaveCodec::new(&exe);
        let bytes = codec.encode(&tree).expect("must not wedge on full pipes");
        let back: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, tree);
    }

    #[cfg(unix)]
    #[test]
    fn codec_exiting_before_draining_stdin_reports_status_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_codec(dir.path(), "#!/bin/sh\necho 'bad container' >&2\nexit 3\n");

        let tree = json!({"root": {"properties": {"Blob_0": vec![7i64; 400_000]}}});
        let codec = tse_core::SaveCodec::new(&exe);
        match codec.encode(&tree).unwrap_err() {
            tse_core::SaveError::CodecFailed { status, stderr, .. } => {
                assert_eq!(status, 3);
                assert!(stderr.contains("bad container"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_codec_binary_is_a_typed_failure() {
        let codec = tse_core::SaveCodec::new("definitely-not-a-real-codec");
        let err = codec.ensure_ok().unwrap_err();
        assert!(matches!(err, tse_core::SaveError::CodecUnavailable { .. }));
    }

    #[test]
    fn zip_backup_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let sav = dir.path().join("Slot_0.sav");
        let mut f = std::fs::File::create(&sav).unwrap();
        f.write_all(b"GVAS").unwrap();
        let zip = tse_core::backup::zip_backup(&sav).unwrap();
        assert!(zip.exists());
        assert_eq!(zip.extension().and_then(|s| s.to_str()), Some("zip"));
    }

    #[test]
    fn zip_backup_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("slot/a")).unwrap();
        std::fs::write(dir.path().join("slot/a/x.sav"), b"GVAS").unwrap();
        let zip = tse_core::backup::zip_backup(&dir.path().join("slot")).unwrap();
        assert!(zip.exists());
    }
}
