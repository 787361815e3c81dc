mod common;

use common::{mapping_response, Article};
use serde_json::{json, Value};
use skillet::{BackendClient, BatchWriter, ClientConfig, FieldType, SkilletError};
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn connect(base_url: String) -> BackendClient {
    BackendClient::new(ClientConfig {
        base_url,
        collection: "content".to_string(),
    })
    .unwrap()
}

mod configuration {
    use super::*;

    #[test]
    fn an_empty_collection_is_a_configuration_error() {
        let err = BackendClient::new(ClientConfig {
            base_url: "http://localhost:9200".to_string(),
            collection: String::new(),
        })
        .unwrap_err();
        assert!(matches!(err, SkilletError::Config(_)));
    }

    #[test]
    fn a_malformed_base_url_is_a_configuration_error() {
        let err = BackendClient::new(ClientConfig {
            base_url: "not a url".to_string(),
            collection: "content".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, SkilletError::Config(_)));
    }
}

mod searching {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn search_sends_the_body_and_parses_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/articles/_search"))
            .and(body_json(json!({"query": {"match_all": {}}, "size": 10, "from": 0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "took": 3,
                "hits": {
                    "total": 2,
                    "hits": [
                        {"_id": "1", "_source": {"Article": {"title": "first"}}},
                        {"_id": "2", "_source": {"Article": {"title": "second"}}}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let response = tokio::task::spawn_blocking(move || {
            let client = connect(base);
            client.search(
                "articles",
                &json!({"query": {"match_all": {}}, "size": 10, "from": 0}),
            )
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.total(), 2);
        let hits = response.into_hits();
        assert_eq!(hits[0].id, "1");
        assert_eq!(
            hits[0].source,
            Some(json!({"Article": {"title": "first"}}))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn count_reads_the_count_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/articles/_count"))
            .and(body_json(json!({"match_all": {}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 42,
                "_shards": {"total": 5, "successful": 5, "failed": 0}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let count = tokio::task::spawn_blocking(move || {
            connect(base).count("articles", &json!({"match_all": {}}))
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(count, 42);
    }
}

mod error_classification {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn a_404_error_body_means_the_collection_is_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/articles/_search"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "IndexMissingException[[content] missing]",
                "status": 404
            })))
            .mount(&server)
            .await;

        let base = server.uri();
        let err = tokio::task::spawn_blocking(move || {
            connect(base).search("articles", &json!({"query": {"match_all": {}}}))
        })
        .await
        .unwrap()
        .unwrap_err();
        match err {
            SkilletError::MissingCollection(collection) => assert_eq!(collection, "content"),
            other => panic!("Expected MissingCollection, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn other_error_bodies_carry_the_reported_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/articles/_search"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "SearchPhaseExecutionException[failed to execute]",
                "status": 500
            })))
            .mount(&server)
            .await;

        let base = server.uri();
        let err = tokio::task::spawn_blocking(move || {
            connect(base).search("articles", &json!({"query": {"match_all": {}}}))
        })
        .await
        .unwrap()
        .unwrap_err();
        match err {
            SkilletError::Backend { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("SearchPhaseExecutionException"));
            }
            other => panic!("Expected Backend, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_statuses_without_an_error_body_still_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/articles/_count"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"unavailable": true})))
            .mount(&server)
            .await;

        let base = server.uri();
        let err = tokio::task::spawn_blocking(move || {
            connect(base).count("articles", &json!({"match_all": {}}))
        })
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(err, SkilletError::Backend { status: 503, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn an_empty_response_body_is_an_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/articles/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let base = server.uri();
        let err = tokio::task::spawn_blocking(move || connect(base).get_document("articles", "1"))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, SkilletError::Http(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bulk_item_failures_surface_with_their_positions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content/articles/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "took": 5,
                "items": [
                    {"index": {"_id": "1", "status": 200}},
                    {"index": {"_id": "2", "error": "MapperParsingException[failed to parse]", "status": 400}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let err = tokio::task::spawn_blocking(move || {
            let mut documents = indexmap::IndexMap::new();
            documents.insert("1".to_string(), json!({"Article": {"title": "ok"}}));
            documents.insert("2".to_string(), json!({"Article": {"title": 7}}));
            connect(base).bulk("articles", &documents)
        })
        .await
        .unwrap()
        .unwrap_err();
        match err {
            SkilletError::BulkItemError(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].position, 1);
                assert_eq!(failures[0].id, "2");
                assert!(failures[0].error.contains("MapperParsingException"));
            }
            other => panic!("Expected BulkItemError, got {:?}", other),
        }
    }
}

mod schema_cache {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn the_mapping_is_fetched_once_for_repeated_resolvers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/_mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mapping_response()))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        tokio::task::spawn_blocking(move || {
            let client = connect(base);
            let first = client.resolver().unwrap();
            assert_eq!(first.type_of(&Article, "rating"), Some(FieldType::Integer));
            let second = client.resolver().unwrap();
            assert_eq!(second.type_of(&Article, "location"), Some(FieldType::GeoPoint));
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn putting_a_mapping_invalidates_the_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/_mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mapping_response()))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/content/articles/_mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        tokio::task::spawn_blocking(move || {
            let client = connect(base);
            client.resolver().unwrap();
            client
                .put_mapping(
                    "articles",
                    &json!({"articles": {"properties": {"Article": {"properties": {}}}}}),
                )
                .unwrap();
            client.resolver().unwrap();
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn check_mapping_reports_declared_entity_types() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/_mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mapping_response()))
            .mount(&server)
            .await;

        let base = server.uri();
        let (known, unknown) = tokio::task::spawn_blocking(move || {
            let client = connect(base);
            (
                client.check_mapping("articles").unwrap(),
                client.check_mapping("users").unwrap(),
            )
        })
        .await
        .unwrap();
        assert!(known);
        assert!(!unknown);
    }
}

mod documents {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn index_document_puts_under_the_identity() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/content/articles/7"))
            .and(body_json(json!({"Article": {"id": "7", "title": "x"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "_id": "7", "_version": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let response = tokio::task::spawn_blocking(move || {
            connect(base).index_document("articles", "7", &json!({"Article": {"id": "7", "title": "x"}}))
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(response["_id"], json!("7"));
    }

    #[test]
    fn index_document_rejects_an_empty_identity() {
        let client = connect("http://localhost:1".to_string());
        let err = client
            .index_document("articles", "", &json!({"Article": {}}))
            .unwrap_err();
        assert!(matches!(err, SkilletError::MissingIdentity(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_document_issues_a_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/content/articles/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "found": true})))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        tokio::task::spawn_blocking(move || connect(base).delete_document("articles", "7"))
            .await
            .unwrap()
            .unwrap();
    }
}

mod collections {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn creating_with_an_alias_posts_alias_actions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_aliases"))
            .and(body_json(json!({
                "actions": [{"add": {"index": "content_v2", "alias": "content"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        tokio::task::spawn_blocking(move || {
            connect(base).create_collection("content_v2", Some("content"))
        })
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn creating_without_an_alias_puts_the_collection() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/content_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        tokio::task::spawn_blocking(move || connect(base).create_collection("content_v2", None))
            .await
            .unwrap()
            .unwrap();
    }
}

mod batched_writes {
    use super::*;
    use skillet::Entity;

    /// Child entity saved into the same physical document as its article.
    struct Comment;

    impl Entity for Comment {
        fn namespace(&self) -> &str {
            "Comment"
        }

        fn entity_type(&self) -> &str {
            "articles"
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_flushes_merged_documents_as_one_bulk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content/articles/_bulk"))
            .and(body_string_contains(
                r#"{"Article":{"id":"7","title":"x","rating":4},"Comment":{"id":"7","body":"hi"}}"#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "took": 1,
                "items": [{"index": {"_id": "7", "status": 200}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let response: Value = tokio::task::spawn_blocking(move || {
            let client = connect(base);
            let mut writer = BatchWriter::new();
            writer.begin();
            writer
                .save(&client, &Article, json!({"id": "7", "title": "x"}))
                .unwrap();
            writer
                .save(&client, &Article, json!({"id": "7", "rating": 4}))
                .unwrap();
            writer
                .save(&client, &Comment, json!({"id": "7", "body": "hi"}))
                .unwrap();
            writer.commit(&client)
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(response["took"], json!(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_outside_a_transaction_indexes_directly() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/content/articles/7"))
            .and(body_json(json!({"Article": {"id": "7", "title": "x"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "_id": "7"})))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        tokio::task::spawn_blocking(move || {
            let client = connect(base);
            BatchWriter::new().save(&client, &Article, json!({"id": "7", "title": "x"}))
        })
        .await
        .unwrap()
        .unwrap();
    }
}
