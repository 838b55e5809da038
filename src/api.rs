use crate::analytics::FeatureImportance;
use crate::data::parse_csv;
use crate::error::PredictorError;
use crate::features::{form_options, StudentForm, MODEL_COLUMNS};
use crate::model::{ModelInfo, Predictor};
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Serialize;

#[derive(Serialize)]
struct ModelInfoResponse {
    model: ModelInfo,
    feature_importances: Vec<FeatureImportance>,
    top_features: Vec<FeatureImportance>,
}

/// Registers the dashboard routes. The [`Predictor`] is expected as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| PredictorError::InvalidRequest(err.to_string()).into()),
    )
    .route("/", web::get().to(serve_homepage))
    .route("/predict", web::post().to(predict))
    .route("/batch-predict", web::post().to(batch_predict))
    .route("/options", web::get().to(get_options))
    .route("/model/info", web::get().to(get_model_info))
    .route("/health", web::get().to(health_check));
}

// Prediction endpoint
async fn predict(
    form: web::Json<StudentForm>,
    predictor: web::Data<Predictor>,
) -> Result<HttpResponse, PredictorError> {
    let report = predictor.predict_form(&form)?;
    Ok(HttpResponse::Ok().json(report))
}

// Batch prediction endpoint, JSON array or CSV upload
async fn batch_predict(
    req: HttpRequest,
    body: web::Bytes,
    predictor: web::Data<Predictor>,
) -> Result<HttpResponse, PredictorError> {
    let is_csv = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/csv"))
        .unwrap_or(false);

    let students = if is_csv {
        parse_csv(body.as_ref())?
    } else {
        serde_json::from_slice::<Vec<StudentForm>>(&body)
            .map_err(|e| PredictorError::InvalidRequest(e.to_string()))?
    };

    let report = predictor.predict_batch(&students)?;
    Ok(HttpResponse::Ok().json(report))
}

async fn get_options() -> HttpResponse {
    HttpResponse::Ok().json(form_options())
}

// Model info endpoint
async fn get_model_info(predictor: web::Data<Predictor>) -> HttpResponse {
    let importances = predictor.classifier().feature_importances().to_vec();
    let feature_importances = MODEL_COLUMNS
        .iter()
        .zip(importances)
        .map(|(name, importance)| FeatureImportance {
            feature: name.to_string(),
            importance,
        })
        .collect();

    HttpResponse::Ok().json(ModelInfoResponse {
        model: predictor.model_info(),
        feature_importances,
        top_features: predictor.top_features().to_vec(),
    })
}

// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("Student Success Predictor is running!")
}

// Homepage endpoint
async fn serve_homepage() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(HOMEPAGE)
}

const HOMEPAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Student Performance Predictor</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 0; display: flex; min-height: 100vh; }
        .sidebar { width: 300px; background: #f0f2f6; padding: 25px; }
        .main { flex: 1; padding: 30px 40px; }
        .form-group { margin: 14px 0; }
        label { display: block; margin-bottom: 5px; font-weight: bold; }
        select, input[type=range] { width: 100%; }
        button { background: #007bff; color: white; padding: 12px 24px; border: none; border-radius: 4px; cursor: pointer; width: 100%; margin-top: 15px; }
        button:hover { background: #0056b3; }
        .metrics { display: grid; grid-template-columns: 1fr 1fr 1fr; gap: 15px; margin: 20px 0; }
        .metric { background: white; padding: 15px; border-radius: 8px; border: 1px solid #ddd; }
        .metric h4 { margin: 0 0 8px 0; color: #555; }
        .metric p { font-size: 24px; margin: 0; }
        .delta { font-size: 14px; margin-top: 6px; }
        .pass { color: #155724; }
        .fail { color: #721c24; }
        .charts { display: grid; grid-template-columns: 1fr 1fr; gap: 30px; }
        .bar-chart { position: relative; height: 220px; display: flex; align-items: flex-end; gap: 18px; border-bottom: 1px solid #333; padding: 0 10px; }
        .bar { flex: 1; background: #4c78a8; position: relative; }
        .bar span { position: absolute; top: -20px; width: 100%; text-align: center; font-size: 12px; }
        .bar-labels { display: flex; gap: 18px; padding: 0 10px; }
        .bar-labels div { flex: 1; text-align: center; font-size: 12px; }
        .threshold { position: absolute; left: 0; right: 0; border-top: 2px dashed #dc3545; }
        .hbar-row { display: flex; align-items: center; margin: 8px 0; font-size: 12px; }
        .hbar-row .name { width: 45%; padding-right: 8px; text-align: right; }
        .hbar-row .fill { height: 18px; background: #f58518; }
        .error { background: #f8d7da; color: #721c24; padding: 15px; border-radius: 5px; }
        #result { display: none; }
    </style>
</head>
<body>
    <div class="sidebar">
        <h2>Input Parameters</h2>
        <p>Adjust the student details below:</p>

        <div class="form-group">
            <label for="math_score">Math Score: <span id="math_score_value">50</span></label>
            <input type="range" id="math_score" min="0" max="100" value="50">
        </div>
        <div class="form-group">
            <label for="reading_score">Reading Score: <span id="reading_score_value">50</span></label>
            <input type="range" id="reading_score" min="0" max="100" value="50">
        </div>
        <div class="form-group">
            <label for="writing_score">Writing Score: <span id="writing_score_value">50</span></label>
            <input type="range" id="writing_score" min="0" max="100" value="50">
        </div>

        <hr>
        <h3>Demographics</h3>
        <div class="form-group"><label for="gender">Gender</label><select id="gender"></select></div>
        <div class="form-group"><label for="race_ethnicity">Race/Ethnicity</label><select id="race_ethnicity"></select></div>
        <div class="form-group"><label for="parental_education">Parental Education</label><select id="parental_education"></select></div>
        <div class="form-group"><label for="lunch">Lunch Type</label><select id="lunch"></select></div>
        <div class="form-group"><label for="test_preparation">Test Prep Course</label><select id="test_preparation"></select></div>

        <button onclick="predict()">Predict</button>
    </div>

    <div class="main">
        <h1>Student Academic Success Predictor</h1>
        <p>Pass/fail forecast from a gradient boosted model trained on student demographics.</p>

        <div id="error" class="error" style="display: none;"></div>

        <div id="result">
            <div class="metrics">
                <div class="metric">
                    <h4>Prediction</h4>
                    <p id="prediction"></p>
                </div>
                <div class="metric">
                    <h4>Certainty</h4>
                    <p id="certainty"></p>
                </div>
                <div class="metric">
                    <h4>Average Score</h4>
                    <p id="average"></p>
                    <div id="standing" class="delta"></div>
                </div>
            </div>

            <div class="charts">
                <div>
                    <h3>Scores vs Passing Threshold</h3>
                    <div id="score-chart" class="bar-chart"></div>
                    <div id="score-labels" class="bar-labels"></div>
                </div>
                <div>
                    <h3>Top 5 Important Features</h3>
                    <div id="importance-chart"></div>
                </div>
            </div>
        </div>
    </div>

    <script>
        const SELECTS = ['gender', 'race_ethnicity', 'parental_education', 'lunch', 'test_preparation'];
        const SLIDERS = ['math_score', 'reading_score', 'writing_score'];

        async function loadOptions() {
            const response = await fetch('/options');
            const options = await response.json();
            for (const field of SELECTS) {
                const select = document.getElementById(field);
                select.innerHTML = options[field].map(v => `<option value="${v}">${v}</option>`).join('');
            }
        }

        for (const field of SLIDERS) {
            const slider = document.getElementById(field);
            slider.addEventListener('input', () => {
                document.getElementById(field + '_value').textContent = slider.value;
            });
        }

        function showError(message) {
            const errorDiv = document.getElementById('error');
            errorDiv.textContent = message;
            errorDiv.style.display = 'block';
            document.getElementById('result').style.display = 'none';
        }

        async function predict() {
            const body = {};
            for (const field of SELECTS) body[field] = document.getElementById(field).value;
            for (const field of SLIDERS) body[field] = parseInt(document.getElementById(field).value, 10);

            try {
                const response = await fetch('/predict', {
                    method: 'POST',
                    headers: {'Content-Type': 'application/json'},
                    body: JSON.stringify(body)
                });
                const data = await response.json();
                if (!response.ok) {
                    showError(data.error ? data.error.message : 'Prediction failed');
                    return;
                }
                render(data);
            } catch (error) {
                showError(`Error: ${error.message}`);
            }
        }

        function render(data) {
            document.getElementById('error').style.display = 'none';
            document.getElementById('result').style.display = 'block';

            const prediction = document.getElementById('prediction');
            prediction.textContent = data.prediction;
            prediction.className = data.prediction === 'Pass' ? 'pass' : 'fail';
            document.getElementById('certainty').textContent = `${data.certainty.toFixed(2)}%`;
            document.getElementById('average').textContent = data.scores.average_display;

            const standing = document.getElementById('standing');
            standing.textContent = data.scores.standing;
            standing.className = 'delta ' + (data.scores.standing === 'Pass' ? 'pass' : 'fail');

            const chart = data.score_chart;
            document.getElementById('score-chart').innerHTML =
                chart.values.map(v => `<div class="bar" style="height: ${v}%"><span>${v.toFixed(1)}</span></div>`).join('') +
                `<div class="threshold" style="bottom: ${chart.threshold}%"></div>`;
            document.getElementById('score-labels').innerHTML =
                chart.labels.map(l => `<div>${l}</div>`).join('');

            const importance = data.importance_chart;
            const max = Math.max(...importance.values, 1e-9);
            document.getElementById('importance-chart').innerHTML = importance.labels.map((label, i) => `
                <div class="hbar-row">
                    <div class="name">${label}</div>
                    <div class="fill" style="width: ${(importance.values[i] / max) * 50}%"></div>
                    <div>&nbsp;${importance.values[i].toFixed(3)}</div>
                </div>
            `).join('');
        }

        loadOptions().catch(error => showError(`Error loading options: ${error.message}`));
    </script>
</body>
</html>
"#;
