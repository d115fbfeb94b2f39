use crate::DbPool;

/// One seed row for the appointments table, used by tests and local setups.
#[derive(Clone, Debug, PartialEq)]
pub struct AppointmentSeed {
    pub row_id: String,
    pub subject_id: String,
    pub appointment_type: String,
    pub appointment_date_time: String,
    pub appointment_status: String,
    pub cancel_reason_code: Option<f64>,
    pub record_type: String,
    pub site_name: String,
    pub site_address: String,
    pub site_instructions: Option<String>,
}

impl AppointmentSeed {
    /// Two representative appointments for one subject: a confirmed upcoming
    /// visit with arrival instructions and a completed past one without.
    pub fn sample_set(subject_id: &str) -> Vec<Self> {
        vec![
            Self {
                row_id: format!("{subject_id}-a1"),
                subject_id: subject_id.to_string(),
                appointment_type: "בדיקת דם".to_string(),
                appointment_date_time: "2025-01-12 08:30:00".to_string(),
                appointment_status: "completed".to_string(),
                cancel_reason_code: None,
                record_type: "appointment".to_string(),
                site_name: "אסותא רמת החייל".to_string(),
                site_address: "הברזל 20, תל אביב".to_string(),
                site_instructions: None,
            },
            Self {
                row_id: format!("{subject_id}-a2"),
                subject_id: subject_id.to_string(),
                appointment_type: "אורתופדיה".to_string(),
                appointment_date_time: "2025-03-02 14:00:00".to_string(),
                appointment_status: "confirmed".to_string(),
                cancel_reason_code: None,
                record_type: "appointment".to_string(),
                site_name: "אסותא אשדוד".to_string(),
                site_address: "הרפואה 7, אשדוד".to_string(),
                site_instructions: Some("קומה 2, אגף ב'. יש להגיע 15 דקות לפני התור.".to_string()),
            },
        ]
    }
}

pub async fn seed_appointments(
    pool: &DbPool,
    appointments: &[AppointmentSeed],
) -> Result<(), sqlx::Error> {
    for appointment in appointments {
        sqlx::query(
            "INSERT OR REPLACE INTO appointments ( \
                 row_id, subject_id, appoitment_type, appointment_date_time_c, \
                 appointment_status, cancel_reason_code, record_type, \
                 site_name, site_address, site_instructions \
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&appointment.row_id)
        .bind(&appointment.subject_id)
        .bind(&appointment.appointment_type)
        .bind(&appointment.appointment_date_time)
        .bind(&appointment.appointment_status)
        .bind(appointment.cancel_reason_code)
        .bind(&appointment.record_type)
        .bind(&appointment.site_name)
        .bind(&appointment.site_address)
        .bind(&appointment.site_instructions)
        .execute(pool)
        .await?;
    }

    Ok(())
}
