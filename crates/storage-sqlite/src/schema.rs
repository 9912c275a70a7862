// Hand-maintained to match migrations/.

diesel::table! {
    wallets (id) {
        id -> Text,
        user_id -> Text,
        name -> Text,
        icon_name -> Text,
        color -> Text,
        currency -> Text,
        balance -> Text,
        is_default -> Bool,
        order_index -> Integer,
        created_at -> Text,
        updated_at -> Text,
        deleted_at -> Nullable<Text>,
    }
}

diesel::table! {
    transactions (id) {
        id -> Text,
        user_id -> Text,
        wallet_id -> Text,
        category_id -> Nullable<Text>,
        payment_method_id -> Nullable<Text>,
        amount -> Text,
        title -> Text,
        notes -> Nullable<Text>,
        date -> Text,
        is_income -> Bool,
        #[sql_name = "type"]
        transaction_type -> Text,
        special_type -> Integer,
        is_paid -> Bool,
        original_due_date -> Nullable<Text>,
        skip_paid -> Bool,
        paired_transaction_id -> Nullable<Text>,
        recurring_config_id -> Nullable<Text>,
        receipt_image_url -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
        deleted_at -> Nullable<Text>,
    }
}

diesel::table! {
    recurring_configs (id) {
        id -> Text,
        user_id -> Text,
        base_transaction_id -> Text,
        period_length -> Integer,
        reoccurrence -> Text,
        start_date -> Text,
        end_date -> Nullable<Text>,
        next_occurrence -> Text,
        is_active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    sync_logs (id) {
        id -> Text,
        user_id -> Text,
        table_name -> Text,
        last_sync_at -> Nullable<Text>,
        last_server_version -> BigInt,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(transactions -> wallets (wallet_id));

diesel::allow_tables_to_appear_in_same_query!(wallets, transactions, recurring_configs, sync_logs);
