//! Column names of the three datasets. Filter panels, metrics and rules resolve against these
//! names exactly.

pub mod deals {
    pub const RECORD_ID: &str = "Record ID";
    pub const DEAL_SCORE: &str = "Deal Score";
    pub const DEAL_PROBABILITY: &str = "Deal probability";
    pub const DAYS_TO_CLOSE: &str = "Days to close";
    pub const AMOUNT: &str = "Amount";
    pub const WEIGHTED_AMOUNT: &str = "Weighted amount";
    pub const DEAL_STAGE: &str = "Deal Stage";

    pub const FORECAST_CATEGORIES: [&str; 4] = [
        "Forecast category_Closed won",
        "Forecast category_Commit",
        "Forecast category_Not forecasted",
        "Forecast category_Pipeline",
    ];

    pub const DEAL_TYPE_NEW: &str = "Deal Type_New";
    pub const DEAL_TYPE_PS: &str = "Deal Type_PS";
    pub const DEAL_TYPE_RENEWAL: &str = "Deal Type_Renewal";
    pub const DEAL_TYPES: [&str; 3] = [DEAL_TYPE_NEW, DEAL_TYPE_PS, DEAL_TYPE_RENEWAL];
}

pub mod tickets {
    pub const TICKET_ID: &str = "Ticket ID";
    pub const RESPONSE_TIME_HOURS: &str = "Response time hours";
    pub const IMPLEMENTATION_DAYS: &str = "Implementation Duration Days";
    pub const TRAINING_COMPLETIONS: &str = "Training Completion Count";
    pub const STATUS: &str = "Ticket status";
    pub const CREATE_YEAR: &str = "Create date_Year";
    pub const CREATE_MONTH: &str = "Create date_Month";

    pub const REQUIRES_ONBOARDING: &str = "Requirements for the Trial_Onboarding";
    pub const REQUIRES_COACHING: &str = "Requirements for the Trial_Coaching";
    pub const REQUIRES_ASSESSMENT: &str = "Requirements for the Trial_Assessment";
}

pub mod companies {
    pub const CREATE_YEAR: &str = "Create Date_Year";
    pub const FORM_SUBMISSION: &str = "Form Submission YN";
    pub const CLOSE: &str = "Close YN";

    pub const TYPE_PREFIX: &str = "Type_";
    pub const PRIMARY_INDUSTRY_PREFIX: &str = "Primary Industry_";
    pub const COUNTRY_PREFIX: &str = "Country/Region_";
    pub const WEB_TECHNOLOGY_PREFIX: &str = "Web Technologies_";

    /// Derived per-row count of web technology flags.
    pub const TECH_COUNT: &str = "Tech Count";
}
