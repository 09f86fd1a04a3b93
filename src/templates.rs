use askama::Template;
use uuid::Uuid;

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub title: String,
    /// Operator-facing explanation when the hosted platform is not usable.
    pub connection_problem: Option<String>,
    pub signed_in_as: Option<String>,
    pub login_path: String,
    pub dashboard_path: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub title: String,
    pub error: Option<String>,
    pub message: Option<String>,
    pub action: String,
    pub submit: String,
    pub redirect_to: Option<String>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub title: String,
    pub error: Option<String>,
    pub message: Option<String>,
    pub action: String,
    pub submit: String,
    pub redirect_to: Option<String>,
    pub login_path: String,
}

#[derive(Template)]
#[template(path = "forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub title: String,
    pub error: Option<String>,
    pub message: Option<String>,
    pub login_path: String,
}

#[derive(Template)]
#[template(path = "reset_password.html")]
pub struct ResetPasswordTemplate {
    pub title: String,
    pub error: Option<String>,
    pub message: Option<String>,
    pub dashboard_path: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub title: String,
    pub error: Option<String>,
    pub message: Option<String>,
    pub email: String,
    pub user_id: Uuid,
}
