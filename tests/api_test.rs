use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use student_success_predictor::{api, GradientBoostedModel, Predictor};
use std::path::PathBuf;

fn predictor() -> web::Data<Predictor> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/student_model.json");
    let model = GradientBoostedModel::load(path).unwrap();
    web::Data::new(Predictor::new(Box::new(model)).unwrap())
}

macro_rules! app {
    () => {
        test::init_service(App::new().app_data(predictor()).configure(api::configure)).await
    };
}

#[actix_web::test]
async fn test_predict_endpoint() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({
            "gender": "female",
            "race_ethnicity": "group B",
            "parental_education": "bachelor's degree",
            "lunch": "standard",
            "test_preparation": "completed",
            "math_score": 70,
            "reading_score": 80,
            "writing_score": 75
        }))
        .to_request();

    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["prediction"], "Pass");
    assert_eq!(body["scores"]["average_display"], "75.00");
    assert_eq!(body["scores"]["standing"], "Pass");
    assert_eq!(body["score_chart"]["threshold"], 40.0);
    assert_eq!(body["top_features"].as_array().unwrap().len(), 5);
    assert_eq!(body["importance_chart"]["labels"][0], "lunch_standard");
    let certainty = body["certainty"].as_f64().unwrap();
    assert!((certainty - 63.4136).abs() < 1e-3);
}

#[actix_web::test]
async fn test_predict_accepts_dataset_field_names() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({
            "gender": "male",
            "race/ethnicity": "group A",
            "parental level of education": "some high school",
            "lunch": "free/reduced",
            "test preparation course": "none"
        }))
        .to_request();

    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["prediction"], "Fail");
    assert_eq!(body["scores"]["average_display"], "50.00");
}

#[actix_web::test]
async fn test_invalid_category_is_bad_request() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({
            "gender": "female",
            "race_ethnicity": "group Z",
            "parental_education": "high school",
            "lunch": "standard",
            "test_preparation": "none"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "INVALID_CATEGORY");
    assert_eq!(body["error"]["message"], "Invalid value 'group Z' for race/ethnicity");
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({ "gender": "female", "math_score": "high" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[actix_web::test]
async fn test_batch_predict_csv() {
    let app = app!();
    let csv = "\
gender,race/ethnicity,parental level of education,lunch,test preparation course,math score,reading score,writing score
female,group B,bachelor's degree,standard,completed,70,80,75
male,group A,some high school,free/reduced,none,30,35,20
";
    let req = test::TestRequest::post()
        .uri("/batch-predict")
        .insert_header(("content-type", "text/csv"))
        .set_payload(csv)
        .to_request();

    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total_students"], 2);
    assert_eq!(body["summary"]["pass_count"], 1);
    assert_eq!(body["summary"]["fail_count"], 1);
    assert_eq!(body["predictions"][0]["prediction"], "Pass");
    assert_eq!(body["predictions"][1]["prediction"], "Fail");
    assert_eq!(body["predictions"][1]["standing"], "Fail");
}

#[actix_web::test]
async fn test_batch_predict_json_reports_bad_row() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/batch-predict")
        .set_json(json!([
            {
                "gender": "female",
                "race_ethnicity": "group C",
                "parental_education": "master's degree",
                "lunch": "standard",
                "test_preparation": "none"
            },
            {
                "gender": "female",
                "race_ethnicity": "group C",
                "parental_education": "master's degree",
                "lunch": "standard",
                "test_preparation": "none",
                "writing_score": 120
            }
        ]))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "INVALID_BATCH_RECORD");
    assert_eq!(
        body["error"]["message"],
        "Row 2: writing score must be between 0 and 100, got 120"
    );
}

#[actix_web::test]
async fn test_options_and_model_info() {
    let app = app!();

    let req = test::TestRequest::get().uri("/options").to_request();
    let options: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(options["parental_education"].as_array().unwrap().len(), 6);
    assert_eq!(options["race_ethnicity"][4], "group E");
    assert_eq!(options["score_max"], 100);

    let req = test::TestRequest::get().uri("/model/info").to_request();
    let info: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(info["model"]["objective"], "binary:logistic");
    assert_eq!(info["model"]["num_trees"], 3);
    assert_eq!(info["feature_importances"].as_array().unwrap().len(), 17);
    assert_eq!(info["top_features"][0]["feature"], "lunch_standard");
}

#[actix_web::test]
async fn test_homepage_and_health() {
    let app = app!();

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body = test::read_body(resp).await;
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains("id=\"math_score\" min=\"0\" max=\"100\" value=\"50\""));
    assert!(html.contains("Predict"));

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
