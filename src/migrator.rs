use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_account_tables::Migration),
            Box::new(m20240301_000002_create_catalog_tables::Migration),
            Box::new(m20240301_000003_create_discount_tables::Migration),
            Box::new(m20240301_000004_create_wishlist_tables::Migration),
            Box::new(m20240301_000005_create_order_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_account_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_account_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::DefaultShippingAddressId).uuid().null())
                        .col(ColumnDef::new(Users::DefaultBillingAddressId).uuid().null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Addresses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Addresses::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Addresses::UserId).uuid().null())
                        .col(ColumnDef::new(Addresses::FirstName).string().not_null())
                        .col(ColumnDef::new(Addresses::LastName).string().not_null())
                        .col(ColumnDef::new(Addresses::CompanyName).string().not_null())
                        .col(ColumnDef::new(Addresses::StreetAddress1).string().not_null())
                        .col(ColumnDef::new(Addresses::StreetAddress2).string().not_null())
                        .col(ColumnDef::new(Addresses::City).string().not_null())
                        .col(ColumnDef::new(Addresses::CityArea).string().not_null())
                        .col(ColumnDef::new(Addresses::PostalCode).string().not_null())
                        .col(ColumnDef::new(Addresses::Country).string_len(2).not_null())
                        .col(ColumnDef::new(Addresses::CountryArea).string().not_null())
                        .col(ColumnDef::new(Addresses::Phone).string().not_null())
                        .col(
                            ColumnDef::new(Addresses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_addresses_user_id")
                        .table(Addresses::Table)
                        .col(Addresses::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Addresses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Email,
        DefaultShippingAddressId,
        DefaultBillingAddressId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Addresses {
        Table,
        Id,
        UserId,
        FirstName,
        LastName,
        CompanyName,
        #[sea_orm(iden = "street_address_1")]
        StreetAddress1,
        #[sea_orm(iden = "street_address_2")]
        StreetAddress2,
        City,
        CityArea,
        PostalCode,
        Country,
        CountryArea,
        Phone,
        CreatedAt,
    }
}

mod m20240301_000002_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductVariants::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProductVariants::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::ProductName).string().not_null())
                        .col(ColumnDef::new(ProductVariants::CategoryId).uuid().null())
                        .col(ColumnDef::new(ProductVariants::Name).string().not_null())
                        .col(ColumnDef::new(ProductVariants::Sku).string().not_null())
                        .col(
                            ColumnDef::new(ProductVariants::Price)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductVariants::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(ProductVariants::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::QuantityAllocated)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::TrackInventory)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::IsShippingRequired)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(ProductVariants::Weight).decimal().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductCollections::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ProductCollections::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductCollections::CollectionId)
                                .uuid()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(ProductCollections::ProductId)
                                .col(ProductCollections::CollectionId),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShippingZones::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShippingZones::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ShippingZones::Name).string().not_null())
                        .col(ColumnDef::new(ShippingZones::Countries).json().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShippingMethods::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShippingMethods::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ShippingMethods::ShippingZoneId).uuid().not_null())
                        .col(ColumnDef::new(ShippingMethods::Name).string().not_null())
                        .col(
                            ColumnDef::new(ShippingMethods::MethodType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::Price)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::MinimumOrderPrice)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::MaximumOrderPrice)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::MinimumOrderWeight)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ShippingMethods::MaximumOrderWeight)
                                .decimal()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipping_methods_zone")
                                .from(ShippingMethods::Table, ShippingMethods::ShippingZoneId)
                                .to(ShippingZones::Table, ShippingZones::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShippingMethods::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ShippingZones::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductCollections::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductVariants {
        Table,
        Id,
        ProductId,
        ProductName,
        CategoryId,
        Name,
        Sku,
        Price,
        Currency,
        Quantity,
        QuantityAllocated,
        TrackInventory,
        IsShippingRequired,
        Weight,
    }

    #[derive(DeriveIden)]
    enum ProductCollections {
        Table,
        ProductId,
        CollectionId,
    }

    #[derive(DeriveIden)]
    enum ShippingZones {
        Table,
        Id,
        Name,
        Countries,
    }

    #[derive(DeriveIden)]
    enum ShippingMethods {
        Table,
        Id,
        ShippingZoneId,
        Name,
        MethodType,
        Price,
        MinimumOrderPrice,
        MaximumOrderPrice,
        MinimumOrderWeight,
        MaximumOrderWeight,
    }
}

mod m20240301_000003_create_discount_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_discount_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Vouchers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vouchers::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Vouchers::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Vouchers::Name).string().null())
                        .col(ColumnDef::new(Vouchers::VoucherType).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Vouchers::DiscountValueType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Vouchers::DiscountValue)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Vouchers::MinSpent).decimal().null())
                        .col(
                            ColumnDef::new(Vouchers::MinCheckoutItemsQuantity)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(Vouchers::Countries).json().not_null())
                        .col(ColumnDef::new(Vouchers::ProductIds).json().not_null())
                        .col(ColumnDef::new(Vouchers::CategoryIds).json().not_null())
                        .col(ColumnDef::new(Vouchers::CollectionIds).json().not_null())
                        .col(ColumnDef::new(Vouchers::UsageLimit).integer().null())
                        .col(
                            ColumnDef::new(Vouchers::Used)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Vouchers::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Vouchers::EndDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Vouchers::ApplyOncePerOrder)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Vouchers::ApplyOncePerCustomer)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(VoucherCustomers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(VoucherCustomers::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(VoucherCustomers::VoucherId).uuid().not_null())
                        .col(
                            ColumnDef::new(VoucherCustomers::CustomerEmail)
                                .string()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_voucher_customers_voucher")
                                .from(VoucherCustomers::Table, VoucherCustomers::VoucherId)
                                .to(Vouchers::Table, Vouchers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_voucher_customers_voucher_email")
                        .table(VoucherCustomers::Table)
                        .col(VoucherCustomers::VoucherId)
                        .col(VoucherCustomers::CustomerEmail)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(GiftCards::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(GiftCards::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(GiftCards::Code).string().not_null().unique_key())
                        .col(
                            ColumnDef::new(GiftCards::InitialBalance)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GiftCards::CurrentBalance)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GiftCards::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(GiftCards::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(GiftCards::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GiftCards::EndDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(GiftCards::LastUsedOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(GiftCards::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(VoucherCustomers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Vouchers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Vouchers {
        Table,
        Id,
        Code,
        Name,
        VoucherType,
        DiscountValueType,
        DiscountValue,
        MinSpent,
        MinCheckoutItemsQuantity,
        Countries,
        ProductIds,
        CategoryIds,
        CollectionIds,
        UsageLimit,
        Used,
        StartDate,
        EndDate,
        ApplyOncePerOrder,
        ApplyOncePerCustomer,
    }

    #[derive(DeriveIden)]
    enum VoucherCustomers {
        Table,
        Id,
        VoucherId,
        CustomerEmail,
    }

    #[derive(DeriveIden)]
    enum GiftCards {
        Table,
        Id,
        Code,
        InitialBalance,
        CurrentBalance,
        Currency,
        IsActive,
        StartDate,
        EndDate,
        LastUsedOn,
    }
}

mod m20240301_000004_create_wishlist_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_wishlist_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Wishlists::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Wishlists::Token).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Wishlists::UserId).uuid().null())
                        .col(ColumnDef::new(Wishlists::Email).string().null())
                        .col(ColumnDef::new(Wishlists::ShippingAddressId).uuid().null())
                        .col(ColumnDef::new(Wishlists::BillingAddressId).uuid().null())
                        .col(ColumnDef::new(Wishlists::ShippingMethodId).uuid().null())
                        .col(ColumnDef::new(Wishlists::VoucherCode).string().null())
                        .col(
                            ColumnDef::new(Wishlists::DiscountAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Wishlists::DiscountName).string().null())
                        .col(
                            ColumnDef::new(Wishlists::Note)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Wishlists::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Wishlists::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(Wishlists::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Wishlists::LastChange)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_wishlists_user_id")
                        .table(Wishlists::Table)
                        .col(Wishlists::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WishlistLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(WishlistLines::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(WishlistLines::WishlistToken).uuid().not_null())
                        .col(ColumnDef::new(WishlistLines::VariantId).uuid().not_null())
                        .col(ColumnDef::new(WishlistLines::Quantity).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_wishlist_lines_wishlist")
                                .from(WishlistLines::Table, WishlistLines::WishlistToken)
                                .to(Wishlists::Table, Wishlists::Token)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_wishlist_lines_wishlist_variant")
                        .table(WishlistLines::Table)
                        .col(WishlistLines::WishlistToken)
                        .col(WishlistLines::VariantId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WishlistGiftCards::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WishlistGiftCards::WishlistToken)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WishlistGiftCards::GiftCardId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(WishlistGiftCards::WishlistToken)
                                .col(WishlistGiftCards::GiftCardId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_wishlist_gift_cards_wishlist")
                                .from(WishlistGiftCards::Table, WishlistGiftCards::WishlistToken)
                                .to(Wishlists::Table, Wishlists::Token)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Payments::WishlistToken).uuid().null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().null())
                        .col(ColumnDef::new(Payments::Gateway).string().not_null())
                        .col(ColumnDef::new(Payments::Total).decimal().not_null())
                        .col(ColumnDef::new(Payments::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(Payments::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WishlistGiftCards::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WishlistLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Wishlists::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Wishlists {
        Table,
        Token,
        UserId,
        Email,
        ShippingAddressId,
        BillingAddressId,
        ShippingMethodId,
        VoucherCode,
        DiscountAmount,
        DiscountName,
        Note,
        Quantity,
        Currency,
        CreatedAt,
        LastChange,
    }

    #[derive(DeriveIden)]
    enum WishlistLines {
        Table,
        Id,
        WishlistToken,
        VariantId,
        Quantity,
    }

    #[derive(DeriveIden)]
    enum WishlistGiftCards {
        Table,
        WishlistToken,
        GiftCardId,
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        WishlistToken,
        OrderId,
        Gateway,
        Total,
        Currency,
        IsActive,
        CreatedAt,
    }
}

mod m20240301_000005_create_order_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Orders::Token).uuid().not_null().unique_key())
                        .col(
                            ColumnDef::new(Orders::WishlistToken)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::UserId).uuid().null())
                        .col(ColumnDef::new(Orders::UserEmail).string().null())
                        .col(ColumnDef::new(Orders::ShippingAddressId).uuid().null())
                        .col(ColumnDef::new(Orders::BillingAddressId).uuid().null())
                        .col(ColumnDef::new(Orders::ShippingMethodId).uuid().null())
                        .col(ColumnDef::new(Orders::ShippingMethodName).string().null())
                        .col(
                            ColumnDef::new(Orders::ShippingPriceNet)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::ShippingPriceGross)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::Weight)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::TotalNet).decimal().not_null())
                        .col(ColumnDef::new(Orders::TotalGross).decimal().not_null())
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Orders::VoucherId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::DiscountAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::DiscountName).string().null())
                        .col(
                            ColumnDef::new(Orders::CustomerNote)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(Orders::LanguageCode).string_len(35).not_null())
                        .col(ColumnDef::new(Orders::TrackingClientId).string().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderLines::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::VariantId).uuid().null())
                        .col(ColumnDef::new(OrderLines::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderLines::VariantName).string().not_null())
                        .col(ColumnDef::new(OrderLines::ProductSku).string().not_null())
                        .col(
                            ColumnDef::new(OrderLines::IsShippingRequired)
                                .boolean()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderLines::UnitPriceNet)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderLines::UnitPriceGross)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderLines::TaxRate)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderLines::Currency).string_len(3).not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_lines_order")
                                .from(OrderLines::Table, OrderLines::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderGiftCards::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderGiftCards::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderGiftCards::GiftCardId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(OrderGiftCards::OrderId)
                                .col(OrderGiftCards::GiftCardId),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderGiftCards::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        Token,
        WishlistToken,
        UserId,
        UserEmail,
        ShippingAddressId,
        BillingAddressId,
        ShippingMethodId,
        ShippingMethodName,
        ShippingPriceNet,
        ShippingPriceGross,
        Weight,
        TotalNet,
        TotalGross,
        Currency,
        VoucherId,
        DiscountAmount,
        DiscountName,
        CustomerNote,
        LanguageCode,
        TrackingClientId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderLines {
        Table,
        Id,
        OrderId,
        VariantId,
        ProductName,
        VariantName,
        ProductSku,
        IsShippingRequired,
        Quantity,
        UnitPriceNet,
        UnitPriceGross,
        TaxRate,
        Currency,
    }

    #[derive(DeriveIden)]
    enum OrderGiftCards {
        Table,
        OrderId,
        GiftCardId,
    }
}
