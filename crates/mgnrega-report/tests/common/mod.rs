use mgnrega_core::RawRecord;
use serde_json::json;

/// Rows as data.gov.in delivers them: mixed number and string values, `NA` sentinels, gaps.
pub fn upstream_rows() -> Vec<RawRecord> {
    let rows = json!([
        {"District_Name": "SALEM", "fin_year": "2023-24", "month": "Jan",
         "Total_Households_Worked": "1200", "Total_Individuals_Worked": "1800",
         "Wages": "1502.34", "Material_and_skilled_Wages": "NA", "Total_Exp": "2100.10",
         "Approved_Labour_Budget": "9000", "SC_workers_against_active_workers": "40",
         "ST_workers_against_active_workers": "12", "Total_No_of_Active_Workers": "300",
         "Average_Wage_rate_per_day_per_person": "294.5",
         "percentage_payments_gererated_within_15_days": "99.1",
         "Number_of_Completed_Works": "15", "Total_No_of_Works_Takenup": "60",
         "Average_days_of_employment_provided_per_Household": "42"},
        {"District_Name": "SALEM", "fin_year": "2023-24", "month": "April",
         "Total_Households_Worked": 800, "Total_Individuals_Worked": 1100,
         "Wages": 990.01, "Material_and_skilled_Wages": "120.5", "Total_Exp": "1300",
         "Approved_Labour_Budget": "", "SC_workers_against_active_workers": "22",
         "ST_workers_against_active_workers": "na", "Total_No_of_Active_Workers": "280",
         "Average_Wage_rate_per_day_per_person": "NA",
         "percentage_payments_gererated_within_15_days": "97.36",
         "Number_of_Completed_Works": "9", "Total_No_of_Works_Takenup": "55",
         "Average_days_of_employment_provided_per_Household": "38"},
        {"District_Name": "SALEM", "fin_year": "2023-24", "month": "Oct",
         "Total_Households_Worked": "NA", "Total_Individuals_Worked": "640",
         "Wages": "410.2", "Total_Exp": "700.7", "Total_No_of_Active_Workers": "150",
         "Average_days_of_employment_provided_per_Household": ""},
        {"District_Name": "SALEM", "fin_year": "2022-23", "month": "May",
         "Total_Households_Worked": "1000", "Total_Exp": "1800",
         "Wages": "1200", "Average_Wage_rate_per_day_per_person": "281"},
        {"District_Name": "ERODE", "fin_year": "2023-24", "month": "Jun",
         "Total_Households_Worked": "700", "Total_Exp": "900",
         "Average_days_of_employment_provided_per_Household": "51"}
    ]);
    rows.as_array()
        .expect("array")
        .iter()
        .map(|r| r.as_object().cloned().expect("object"))
        .collect()
}
