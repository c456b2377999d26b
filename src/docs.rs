use crate::api::leave_request::{
    CreateLeave, LeaveFilter, LeaveListResponse, PassResponse, ScanRequest, ScanResponse,
};
use crate::auth::handlers::{LoginResponse, UserInfo};
use crate::lifecycle::scan::QrPayload;
use crate::model::leave_request::{LeaveResponse, Movement, Status};
use crate::model::role::Role;
use crate::models::{LoginReqDto, RegisterReq};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hostel Pass API",
        version = "1.0.0",
        description = r#"
## Hostel Leave & Gate Pass System

Students ask for leave, wardens decide, and security guards scan the
student's QR pass at the gate to track who is out.

### 🔹 Lifecycle
- **pending** → approved by a warden (or by the first gate scan) → **approved / in**
- **approved / in** → scanned leaving → **approved / out**
- **approved / out** → scanned returning → **completed**
- **pending** → rejected by a warden → **rejected**

### 🔐 Security
Endpoints under `/api` need a **JWT Bearer** token from `/auth/login`.
What a caller may do depends on their role: **student**, **warden** or **security**.

### 📷 Scanning
A scan that cannot be read or does not match a stored request answers
`422` with `"rescan": true`; nothing is changed.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave_request::list_requests,
        crate::api::leave_request::create_request,
        crate::api::leave_request::get_request,
        crate::api::leave_request::approve_request,
        crate::api::leave_request::reject_request,
        crate::api::leave_request::delete_request,
        crate::api::leave_request::get_pass,
        crate::api::leave_request::scan_pass,

        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::me
    ),
    components(
        schemas(
            CreateLeave,
            LeaveFilter,
            LeaveResponse,
            LeaveListResponse,
            PassResponse,
            QrPayload,
            ScanRequest,
            ScanResponse,
            Status,
            Movement,
            Role,
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            UserInfo
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave", description = "Leave request APIs"),
        (name = "Scan", description = "Gate scanning APIs"),
        (name = "Auth", description = "Registration and login"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
