use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Case-insensitive email column
        manager
            .get_connection()
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS citext")
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        timestamp_with_time_zone(Users::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(text(Users::FirstName))
                    .col(text(Users::LastName))
                    .col(
                        ColumnDef::new(Users::Email)
                            .custom(Alias::new("citext"))
                            .not_null()
                            .unique_key(),
                    )
                    .col(text(Users::PasswordHash))
                    .col(text(Users::Address).default(""))
                    .col(text(Users::ProfilePicture).default(""))
                    .col(boolean(Users::Activated).default(false))
                    .col(integer(Users::Version).default(1))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tokens::Hash)
                            .binary()
                            .not_null()
                            .primary_key(),
                    )
                    .col(big_integer(Tokens::UserId))
                    .col(timestamp_with_time_zone(Tokens::Expiry))
                    .col(text(Tokens::Scope))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tokens_user_id")
                            .from(Tokens::Table, Tokens::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tokens_user_scope")
                    .table(Tokens::Table)
                    .col(Tokens::UserId)
                    .col(Tokens::Scope)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Permissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Permissions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(text(Permissions::Code).unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UsersPermissions::Table)
                    .if_not_exists()
                    .col(big_integer(UsersPermissions::UserId))
                    .col(big_integer(UsersPermissions::PermissionId))
                    .primary_key(
                        Index::create()
                            .col(UsersPermissions::UserId)
                            .col(UsersPermissions::PermissionId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_permissions_user_id")
                            .from(UsersPermissions::Table, UsersPermissions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_permissions_permission_id")
                            .from(UsersPermissions::Table, UsersPermissions::PermissionId)
                            .to(Permissions::Table, Permissions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                INSERT INTO permissions (code)
                VALUES ('products:read'), ('products:write'), ('products:order')
                ON CONFLICT (code) DO NOTHING
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsersPermissions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Permissions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Tokens::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    CreatedAt,
    FirstName,
    LastName,
    Email,
    PasswordHash,
    Address,
    ProfilePicture,
    Activated,
    Version,
}

#[derive(DeriveIden)]
enum Tokens {
    Table,
    Hash,
    UserId,
    Expiry,
    Scope,
}

#[derive(DeriveIden)]
enum Permissions {
    Table,
    Id,
    Code,
}

#[derive(DeriveIden)]
enum UsersPermissions {
    Table,
    UserId,
    PermissionId,
}
