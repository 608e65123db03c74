use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250801_000002_create_submission_events"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("submission_events"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("event_id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("submission_id"))
                            .text()
                            .not_null(),
                    )
                    // 'ocr_queued' is a retired value still present in rows
                    // written by earlier deployments. Readers accept it;
                    // nothing writes it anymore.
                    .col(
                        ColumnDef::new(Alias::new("event_type"))
                            .text()
                            .not_null()
                            .check(Expr::cust(
                                "event_type IN ('created', 'updated', 'parsed', 'ocr_pending', 'ocr_queued')",
                            )),
                    )
                    .col(ColumnDef::new(Alias::new("payload")).json_binary().not_null())
                    .col(ColumnDef::new(Alias::new("correlation_id")).text())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Alias::new("submission_events"), Alias::new("submission_id"))
                            .to(Alias::new("submissions"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_submission_events_submission_created")
                    .table(Alias::new("submission_events"))
                    .col(Alias::new("submission_id"))
                    .col(Alias::new("created_at"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("submission_events"))
                    .to_owned(),
            )
            .await
    }
}
