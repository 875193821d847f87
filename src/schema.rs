// Diesel schema definitions.
// Timestamps are stored as RFC 3339 text.

diesel::table! {
    articles (row_key) {
        row_key -> BigInt,
        id -> Nullable<BigInt>,
        url -> Text,
        normalized_url -> Text,
        domain -> Text,
        title -> Text,
        content -> Text,
        publish_date -> Nullable<Text>,
        updated_at -> Text,
        inserted_at -> Text,
        country -> Nullable<Text>,
        language -> Nullable<Text>,
        tier -> Nullable<Text>,
        page_rank -> Nullable<Double>,
        social_shares_count -> Nullable<BigInt>,
        backlinks -> Nullable<Double>,
        month -> Nullable<Text>,
        tagged_antler -> Nullable<Bool>,
        tagged_portco -> Nullable<Bool>,
        antler_in_headline -> Nullable<Bool>,
        unbranded_win -> Nullable<Bool>,
        matched_spokespeople -> Nullable<Text>,
        matched_reporter -> Nullable<Text>,
        matched_portcos -> Nullable<Text>,
        matched_vc_investors -> Nullable<Text>,
        matched_vehicle -> Nullable<Text>,
        matched_portco_location -> Nullable<Text>,
        matched_portco_deal_lead -> Nullable<Text>,
        managed_by_fund -> Nullable<Text>,
        kill_pill -> Nullable<Bool>,
        kill_pill_context -> Nullable<Text>,
        kill_pill_count -> Nullable<Integer>,
        unwanted -> Nullable<Bool>,
        unwanted_context -> Nullable<Text>,
        unwanted_count -> Nullable<Integer>,
        text_scraped -> Nullable<Bool>,
        text_scraped_at -> Nullable<Text>,
        text_scrape_error -> Nullable<Text>,
        data_ingestion -> Nullable<Bool>,
        is_complete -> Nullable<Bool>,
    }
}

diesel::table! {
    processing_queue (id) {
        id -> Text,
        url -> Text,
        status -> Text,
        batch_name -> Text,
        created_at -> Text,
        updated_at -> Text,
        error_message -> Text,
        retry_count -> Integer,
        hint_title -> Nullable<Text>,
        hint_publish_date -> Nullable<Text>,
        hint_brand -> Nullable<Text>,
    }
}

diesel::table! {
    domains (domain) {
        domain -> Text,
        page_rank -> Double,
        llm_rank -> Double,
        hn_citation -> Double,
        signal_score -> Double,
        tier -> Text,
        country -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    id_sequences (name) {
        name -> Text,
        last_id -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(articles, processing_queue, domains, id_sequences);
