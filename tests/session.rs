//! Session behavior against a scripted transport: token refresh, login
//! attempt accounting, and the wire shape of each remote operation.

mod common;

use common::{scripted_session, QueuePrompt, URL, USER};
use flowctl::session::{SESSION_COOKIE, SESSION_FIELD};
use flowctl::{ErrorCode, Method, RunOptions};
use serde_json::json;
use std::io::Write;

const LOGIN_PAGE: &str = "<html><body><!-- /.login --></body></html>";
const LOGIN_OK: &str = r#"{"session.id": "fresh", "status": "success"}"#;
const INCORRECT_LOGIN: &str =
    r#"{"error": "Incorrect Login. Username/Password+VPN not found."}"#;
const FLOW_NODES: &str = r#"{"nodes": [{"id": "foo"}, {"id": "bar"}, {"id": "baz"}]}"#;

#[test]
fn warm_token_sends_a_single_request() {
    let (mut session, requests) =
        scripted_session(&[r#"{"nodes": [{"id": "a"}]}"#], Some("tok-1"), None);

    let jobs = session.flow_jobs("proj", "flow").unwrap();
    assert_eq!(jobs.into_iter().collect::<Vec<_>>(), vec!["a"]);

    let requests = requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].cookie_value(SESSION_COOKIE), Some("tok-1"));
    assert_eq!(requests[0].query_value("ajax"), Some("fetchflowjobs"));
}

#[test]
fn rejected_session_refreshes_and_retries_exactly_once() {
    let (mut session, requests) = scripted_session(
        &[LOGIN_PAGE, LOGIN_OK, r#"{"nodes": [{"id": "a"}]}"#],
        Some("stale"),
        Some("pw"),
    );

    session.flow_jobs("proj", "flow").unwrap();
    assert_eq!(session.token(), "fresh");

    let requests = requests.borrow();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].cookie_value(SESSION_COOKIE), Some("stale"));
    assert!(requests[1].is_login());
    assert_eq!(requests[1].method, Method::Post);
    assert_eq!(requests[1].url, URL);
    assert_eq!(requests[1].form_value("username"), Some(USER));
    assert_eq!(requests[1].form_value("password"), Some("pw"));
    assert_eq!(requests[2].cookie_value(SESSION_COOKIE), Some("fresh"));
    assert_eq!(requests.iter().filter(|r| r.is_login()).count(), 1);
}

#[test]
fn rejection_after_refresh_is_server_unavailable() {
    let (mut session, requests) = scripted_session(
        &[LOGIN_PAGE, LOGIN_OK, LOGIN_PAGE],
        Some("stale"),
        Some("pw"),
    );

    let err = session.flow_jobs("proj", "flow").unwrap_err();
    assert_eq!(err.code, ErrorCode::ServerUnavailable);
    assert_eq!(requests.borrow().len(), 3);
}

#[test]
fn empty_token_logs_in_before_the_first_send() {
    let (mut session, requests) = scripted_session(
        &[LOGIN_OK, r#"{"nodes": [{"id": "a"}]}"#],
        None,
        Some("pw"),
    );

    session.flow_jobs("proj", "flow").unwrap();

    let requests = requests.borrow();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].is_login());
    assert_eq!(requests[1].cookie_value(SESSION_COOKIE), Some("fresh"));
}

#[test]
fn wrong_password_reprompts_and_succeeds() {
    let (mut session, requests) =
        scripted_session(&[INCORRECT_LOGIN, LOGIN_OK], None, Some("wrong"));
    session.set_prompt(Box::new(QueuePrompt::new(&["right"])));

    session.refresh(None).unwrap();
    assert_eq!(session.token(), "fresh");

    let requests = requests.borrow();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].form_value("password"), Some("wrong"));
    assert_eq!(requests[1].form_value("password"), Some("right"));
}

#[test]
fn login_attempts_are_bounded() {
    let (mut session, requests) = scripted_session(
        &[INCORRECT_LOGIN, INCORRECT_LOGIN, INCORRECT_LOGIN],
        None,
        None,
    );
    session.set_prompt(Box::new(QueuePrompt::new(&["a", "b", "c"])));

    let err = session.refresh(None).unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthTooManyAttempts);
    assert_eq!(err.details["attempts"], json!(3));
    assert_eq!(requests.borrow().len(), 3);
}

#[test]
fn wrong_password_without_a_prompt_fails_immediately() {
    let (mut session, requests) = scripted_session(&[INCORRECT_LOGIN], None, Some("wrong"));

    let err = session.refresh(None).unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthLoginFailed);
    assert_eq!(requests.borrow().len(), 1);
}

#[test]
fn run_with_unknown_jobs_is_never_submitted() {
    let (mut session, requests) = scripted_session(&[FLOW_NODES], Some("tok"), None);

    let options = RunOptions {
        include_jobs: vec!["foo".into(), "zed".into(), "abc".into()],
        ..RunOptions::default()
    };
    let err = session.run_flow("proj", "flow", &options).unwrap_err();
    assert_eq!(err.code, ErrorCode::FlowUnknownJobs);
    assert_eq!(err.details["jobs"], json!(["abc", "zed"]));

    let requests = requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query_value("ajax"), Some("fetchflowjobs"));
}

#[test]
fn run_with_include_list_disables_the_complement() {
    let (mut session, requests) =
        scripted_session(&[FLOW_NODES, r#"{"execid": 7}"#], Some("tok"), None);

    let options = RunOptions {
        include_jobs: vec!["foo".into()],
        ..RunOptions::default()
    };
    let exec_id = session.run_flow("proj", "flow", &options).unwrap();
    assert_eq!(exec_id, 7);

    let requests = requests.borrow();
    assert_eq!(requests.len(), 2);
    let run = &requests[1];
    assert_eq!(run.form_value("ajax"), Some("executeFlow"));
    assert_eq!(run.form_value("project"), Some("proj"));
    assert_eq!(run.form_value("flow"), Some("flow"));
    assert_eq!(run.form_value("disabled"), Some(r#"["bar","baz"]"#));
    assert_eq!(run.form_value(SESSION_FIELD), Some("tok"));
    assert_eq!(run.cookie_value(SESSION_COOKIE), Some("tok"));
}

#[test]
fn run_flattens_property_overrides() {
    let (mut session, requests) =
        scripted_session(&[r#"{"execid": "9"}"#], Some("tok"), None);

    let options = RunOptions {
        properties: Some(json!({"a": {"b": 1, "c": 2}})),
        ..RunOptions::default()
    };
    let exec_id = session.run_flow("proj", "flow", &options).unwrap();
    assert_eq!(exec_id, 9);

    let requests = requests.borrow();
    let run = &requests[0];
    assert_eq!(run.form_value("flowOverride[a.b]"), Some("1"));
    assert_eq!(run.form_value("flowOverride[a.c]"), Some("2"));
}

#[test]
fn schedule_sends_cron_parameters() {
    let (mut session, requests) = scripted_session(
        &[r#"{"scheduleId": "41", "status": "success"}"#],
        Some("tok"),
        None,
    );

    let value = session
        .schedule_flow("proj", "flow", "0 23 ? * *", &RunOptions::default())
        .unwrap();
    assert_eq!(value["scheduleId"], "41");

    let requests = requests.borrow();
    let req = &requests[0];
    assert!(req.url.ends_with("/schedule"));
    assert_eq!(req.form_value("ajax"), Some("scheduleCronFlow"));
    assert_eq!(req.form_value("projectName"), Some("proj"));
    assert_eq!(req.form_value("cronExpression"), Some("0 23 ? * *"));
}

#[test]
fn schedule_with_include_list_validates_against_the_graph() {
    let (mut session, requests) = scripted_session(
        &[FLOW_NODES, r#"{"scheduleId": "7", "status": "success"}"#],
        Some("tok"),
        None,
    );

    let options = RunOptions {
        include_jobs: vec!["foo".into()],
        ..RunOptions::default()
    };
    session
        .schedule_flow("proj", "flow", "0 23 ? * *", &options)
        .unwrap();

    let requests = requests.borrow();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].query_value("ajax"), Some("fetchflowjobs"));
    let sched = &requests[1];
    assert_eq!(sched.form_value("ajax"), Some("scheduleCronFlow"));
    assert_eq!(sched.form_value("disabled"), Some(r#"["bar","baz"]"#));
}

#[test]
fn schedule_with_unknown_jobs_is_never_submitted() {
    let (mut session, requests) = scripted_session(&[FLOW_NODES], Some("tok"), None);

    let options = RunOptions {
        include_jobs: vec!["nope".into()],
        ..RunOptions::default()
    };
    let err = session
        .schedule_flow("proj", "flow", "0 23 ? * *", &options)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::FlowUnknownJobs);
    assert_eq!(err.details["jobs"], json!(["nope"]));

    let requests = requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query_value("ajax"), Some("fetchflowjobs"));
}

#[test]
fn conflicting_job_lists_fail_before_any_request() {
    let (mut session, requests) = scripted_session(&[], Some("tok"), None);

    let options = RunOptions {
        include_jobs: vec!["a".into()],
        exclude_jobs: vec!["b".into()],
        ..RunOptions::default()
    };
    let err = session.run_flow("proj", "flow", &options).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    assert!(requests.borrow().is_empty());

    let err = session
        .schedule_flow("proj", "flow", "0 23 ? * *", &options)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    assert!(requests.borrow().is_empty());
}

#[test]
fn create_project_posts_the_manager_form() {
    let (mut session, requests) = scripted_session(
        &[r#"{"status": "success", "path": "manager?project=proj"}"#],
        Some("tok"),
        None,
    );

    session.create_project("proj", "demo project").unwrap();

    let requests = requests.borrow();
    assert_eq!(requests[0].form_value("action"), Some("create"));
    assert_eq!(requests[0].form_value("name"), Some("proj"));
    assert_eq!(requests[0].form_value("description"), Some("demo project"));
}

#[test]
fn create_existing_project_surfaces_the_server_message() {
    let (mut session, _) = scripted_session(
        &[r#"{"status": "error", "message": "Project already exists."}"#],
        Some("tok"),
        None,
    );

    let err = session.create_project("proj", "").unwrap_err();
    assert_eq!(err.code, ErrorCode::ServerApplicationError);
    assert_eq!(err.message, "Project already exists.");
}

#[test]
fn delete_project_checks_the_confirmation_banner() {
    let (mut session, requests) = scripted_session(
        &["<html>Project 'proj' was successfully deleted.</html>"],
        Some("tok"),
        None,
    );
    session.delete_project("proj").unwrap();
    assert_eq!(requests.borrow()[0].query_value("delete"), Some("true"));

    let (mut session, _) =
        scripted_session(&["<html>Permission denied</html>"], Some("tok"), None);
    let err = session.delete_project("proj").unwrap_err();
    assert_eq!(err.code, ErrorCode::ServerApplicationError);
}

#[test]
fn missing_flow_reads_as_flow_not_found() {
    let (mut session, _) =
        scripted_session(&["<html>Project page</html>"], Some("tok"), None);
    let err = session.flow_jobs("proj", "nope").unwrap_err();
    assert_eq!(err.code, ErrorCode::FlowNotFound);
}

#[test]
fn cancel_maps_error_payload_to_not_running() {
    let (mut session, _) = scripted_session(
        &[r#"{"error": "Execution 12 isn't running"}"#],
        Some("tok"),
        None,
    );
    let err = session.cancel_execution(12).unwrap_err();
    assert_eq!(err.code, ErrorCode::ExecutionNotRunning);

    let (mut session, requests) = scripted_session(&["{}"], Some("tok"), None);
    session.cancel_execution(12).unwrap();
    assert_eq!(requests.borrow()[0].query_value("ajax"), Some("cancelFlow"));
}

#[test]
fn is_valid_trusts_markerless_responses() {
    let (session, _) = scripted_session(&[""], Some("tok"), None);
    assert!(session.is_valid(None).unwrap());

    let (session, _) = scripted_session(
        &["<html>Login error: please sign in</html>"],
        Some("tok"),
        None,
    );
    assert!(!session.is_valid(None).unwrap());

    // A supplied probe body is scanned without any request.
    let (session, requests) = scripted_session(&[], Some("tok"), None);
    assert!(!session.is_valid(Some(r#"{"error" : "session"}"#)).unwrap());
    assert!(session.is_valid(Some(r#"{"nodes": []}"#)).unwrap());
    assert!(requests.borrow().is_empty());

    // No token means no probe at all.
    let (session, requests) = scripted_session(&[], None, None);
    assert!(!session.is_valid(None).unwrap());
    assert!(requests.borrow().is_empty());
}

#[test]
fn upload_streams_a_multipart_body() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("proj.zip");
    std::fs::File::create(&archive)
        .unwrap()
        .write_all(b"zipbytes")
        .unwrap();

    let (mut session, requests) = scripted_session(
        &[r#"{"projectId": "1", "version": "2"}"#],
        Some("tok"),
        None,
    );
    let value = session.upload_archive("proj", &archive, None).unwrap();
    assert_eq!(value["version"], "2");

    let requests = requests.borrow();
    let body = requests[0].upload_body.as_deref().unwrap();
    assert!(body.contains("zipbytes"));
    assert!(body.contains(r#"name="ajax""#));
    assert!(body.contains(r#"name="project""#));
    assert!(body.contains(r#"filename="proj.zip""#));
    assert!(body.contains("Content-Type: application/zip"));
    assert_eq!(requests[0].cookie_value(SESSION_COOKIE), Some("tok"));
}

#[test]
fn retried_upload_rebuilds_the_body() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("proj.zip");
    std::fs::File::create(&archive)
        .unwrap()
        .write_all(b"zipbytes")
        .unwrap();

    let (mut session, requests) = scripted_session(
        &[LOGIN_PAGE, LOGIN_OK, r#"{"projectId": "1", "version": "3"}"#],
        Some("stale"),
        Some("pw"),
    );
    session.upload_archive("proj", &archive, None).unwrap();

    let requests = requests.borrow();
    assert_eq!(requests.len(), 3);
    let retried = requests[2].upload_body.as_deref().unwrap();
    // The retry carries a complete fresh body under the new token.
    assert!(retried.contains("zipbytes"));
    assert!(retried.contains("fresh"));
}
